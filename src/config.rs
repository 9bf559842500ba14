//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be set with `-f` or the `LEAFSCAN_CONFIG` environment
//! variable.
//!
//! ## Loading Priority
//!
//! Later sources override earlier ones:
//!
//! 1. **Defaults** - see the `Default` implementations below
//! 2. **YAML config file** - default `config.yaml`, skipped if absent
//! 3. **Environment variables** - prefixed with `LEAFSCAN_`, `__` separates nested keys
//! 4. **DATABASE_URL** - overrides `database.url` if set
//!
//! ```bash
//! LEAFSCAN_PORT=9000
//! LEAFSCAN_MODEL__PATH=/srv/models/plant_disease_cnn.onnx
//! LEAFSCAN_LABELS__FILE=/srv/models/labels.txt
//! DATABASE_URL=sqlite:///var/lib/leafscan/database.db
//! ```

use std::path::PathBuf;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::password::Argon2Params;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LEAFSCAN_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
    /// Largest accepted upload for `/predict`, in bytes
    pub max_upload_bytes: usize,
    pub password_hashing: Argon2Params,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite URL, or `memory` for a non-persistent store
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// ONNX model file
    pub path: PathBuf,
    /// Width the model expects; uploads are stretched to this
    pub input_width: u32,
    /// Height the model expects; uploads are stretched to this
    pub input_height: u32,
}

/// Where class names come from. `file` wins when both are set.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LabelsConfig {
    /// Training-set directory whose sorted entry names are the labels
    pub directory: PathBuf,
    /// Newline-separated labels in model output order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: DatabaseConfig::default(),
            model: ModelConfig::default(),
            labels: LabelsConfig::default(),
            max_upload_bytes: 10 * 1024 * 1024,
            password_hashing: Argon2Params::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://database.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/plant_disease_cnn.onnx"),
            input_width: 128,
            input_height: 128,
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("../dataset/train"),
            file: None,
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let config: Self = Self::figment(args).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("LEAFSCAN_").ignore(&["config"]).split("__"));

        if let Ok(url) = std::env::var("DATABASE_URL") {
            figment = figment.merge(("database.url", url));
        }
        figment
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be non-zero");
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            anyhow::bail!(
                "model input size must be non-zero, got {}x{}",
                self.model.input_width,
                self.model.input_height
            );
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be non-zero");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be non-zero");
        }
        crate::password::check_params(self.password_hashing).map_err(|e| anyhow::anyhow!("password_hashing: {e}"))?;
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
