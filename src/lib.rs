//! Plant leaf disease detection backend.
//!
//! Three routes on top of a liveness check: `/signup` and `/login` manage
//! email/password credentials, `/predict` classifies an uploaded leaf photo.
//! Every process-wide dependency (credential store, class labels, model) is
//! built once in [`Application::new`] and handed to the handlers as
//! [`handlers::AppState`].

pub mod auth;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod errors;
pub mod handlers;
pub mod labels;
pub mod models;
pub mod password;
pub mod predictor;
pub mod preprocess;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use tracing::info;

pub use config::Config;

use auth::AuthService;
use classifier::{Classifier, OnnxClassifier};
use decision::DecisionPolicy;
use handlers::AppState;
use labels::ClassLabelSet;
use predictor::Predictor;
use preprocess::ImageNormalizer;

pub struct Application {
    config: Config,
    state: AppState,
}

impl Application {
    /// Open the credential store, load labels and model.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = store::open(&config.database)
            .await
            .context("opening credential store")?;

        let labels = ClassLabelSet::load(&config.labels).context("loading class labels")?;
        let classifier = OnnxClassifier::load(
            &config.model.path,
            config.model.input_width,
            config.model.input_height,
        )?;

        let state = build_state(&config, store, Arc::new(classifier), labels);
        Ok(Self { config, state })
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let bind_addr = self.config.bind_addr();
        let data = web::Data::new(self.state);

        info!("Server running at http://{}:{}", bind_addr.0, bind_addr.1);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(data.clone())
                .app_data(handlers::json_config())
                .configure(handlers::configure)
        })
        .bind(&bind_addr)
        .with_context(|| format!("binding {}:{}", bind_addr.0, bind_addr.1))?
        .run()
        .await?;

        Ok(())
    }
}

/// Wire the already-loaded dependencies into handler state.
pub fn build_state(
    config: &Config,
    store: Arc<dyn store::CredentialStore>,
    classifier: Arc<dyn Classifier>,
    labels: ClassLabelSet,
) -> AppState {
    AppState {
        auth: AuthService::new(store, config.password_hashing),
        predictor: Predictor::new(
            ImageNormalizer::new(config.model.input_width, config.model.input_height),
            classifier,
            DecisionPolicy::new(labels),
        ),
        max_upload_bytes: config.max_upload_bytes,
    }
}
