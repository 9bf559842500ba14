use actix_multipart::{Multipart, MultipartError};
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use tracing::{debug, info, Instrument, Span};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::errors::{Error, Result};
use crate::models::{Credentials, MessageResponse};
use crate::predictor::Predictor;

pub const LIVENESS_MESSAGE: &str = "Plant Disease Detector Backend is running.";

/// Name of the multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// Largest accepted `/signup` or `/login` body. Credentials are two short strings.
pub const JSON_BODY_LIMIT: usize = 16 * 1024;

/// Process-wide dependencies shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub predictor: Predictor,
    pub max_upload_bytes: usize,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/signup").route(web::post().to(signup)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/predict").route(web::post().to(predict)));
}

/// Malformed, oversized or non-JSON bodies get the same `{message}` shape as
/// the other auth failures.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().limit(JSON_BODY_LIMIT).error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        debug!("Rejected JSON body: {}", err);
        let response = HttpResponse::BadRequest().json(MessageResponse::new("Invalid JSON body"));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

pub async fn home() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(LIVENESS_MESSAGE)
}

pub async fn signup(state: web::Data<AppState>, body: web::Json<Credentials>) -> Result<HttpResponse> {
    info!("Signup route called");
    debug!("Received signup data: {}", body);

    state.auth.signup(body.email.as_deref(), body.password.as_deref()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Signup successful")))
}

pub async fn login(state: web::Data<AppState>, body: web::Json<Credentials>) -> Result<HttpResponse> {
    info!("Login route called");
    debug!("Received login data: {}", body);

    state.auth.login(body.email.as_deref(), body.password.as_deref()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Login successful")))
}

pub async fn predict(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("predict", %request_id);

    async move {
        info!("Predict route called");

        let bytes = read_file_field(payload, state.max_upload_bytes)
            .await?
            .ok_or(Error::MissingFile)?;
        debug!(bytes = bytes.len(), "Received upload");

        let predictor = state.predictor.clone();
        let span = Span::current();
        let result = web::block(move || {
            let _guard = span.enter();
            predictor.predict(&bytes)
        })
        .await
        .map_err(|e| Error::Internal {
            operation: format!("run prediction: {e}"),
        })??;

        info!(disease = %result.label, confidence = result.confidence, "Prediction");
        Ok::<_, Error>(HttpResponse::Ok().json(result))
    }
    .instrument(span)
    .await
}

/// Contents of the first `file` field, or `None` if the request carries no
/// form or the form has no such field. Other fields are drained and ignored.
async fn read_file_field(mut payload: Multipart, limit: usize) -> Result<Option<Vec<u8>>> {
    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(MultipartError::NoContentType | MultipartError::ParseContentType) => return Ok(None),
            Err(e) => return Err(Error::MalformedUpload { reason: e.to_string() }),
        };
        let is_file = field.content_disposition().get_name() == Some(FILE_FIELD);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| Error::MalformedUpload { reason: e.to_string() })?;
            if !is_file {
                continue;
            }
            if data.len() + chunk.len() > limit {
                return Err(Error::PayloadTooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }

        if is_file {
            return Ok(Some(data));
        }
    }
    Ok(None)
}
