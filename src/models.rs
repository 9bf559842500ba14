use serde::{Deserialize, Serialize};

/// Body of `/signup` and `/login`. Fields are optional so that an absent
/// field is reported as a missing field rather than a JSON error.
#[derive(Deserialize, Default, Clone)]
pub struct Credentials {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// Hand-written so the password never reaches the logs
impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "email={:?} password={}",
            self.email,
            if self.password.is_some() { "<redacted>" } else { "<none>" }
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A stored credential. Created on signup, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub email: String,
    pub password_hash: String,
}

/// Outcome of the decision policy for one image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResult {
    #[serde(rename = "disease")]
    pub label: String,
    pub confidence: f32,
}
