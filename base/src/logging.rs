use crate::error::FlowdeskError;
use anyhow::Result;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    /// EnvFilter directive (e.g. "info", "app=debug,sqlx=warn")
    pub level: Option<String>,
    /// log to this file (in file_dir) in addition to the console
    pub file_name: Option<String>,
    pub file_dir: Option<String>,
    #[serde(default)]
    pub use_json: bool,
    /// console output goes to stderr: stdout carries command output
    #[serde(default = "default_true")]
    pub use_console: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_string()),
            file_name: None,
            file_dir: None,
            use_json: false,
            use_console: true,
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file_name.as_ref().map(|name| {
            let mut path = PathBuf::from(self.file_dir.as_deref().unwrap_or("."));
            path.push(name);
            path
        })
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG wins over the configured level
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.level.as_deref().unwrap_or("info")))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

pub fn load_tracing_config_from_env() -> Result<LoggingConfig> {
    envy::prefixed("LOG_")
        .from_env::<LoggingConfig>()
        .map_err(|e| {
            FlowdeskError::RuntimeError(format!("cannot read logging config from env: {e:?}"))
                .into()
        })
}

pub fn tracing_init(conf: LoggingConfig) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if conf.use_console {
        let layer = fmt::layer().with_writer(std::io::stderr);
        if conf.use_json {
            layers.push(layer.json().with_filter(conf.env_filter()).boxed());
        } else {
            layers.push(layer.with_filter(conf.env_filter()).boxed());
        }
    }
    if let Some(path) = conf.file_path() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
        if conf.use_json {
            layers.push(layer.json().with_filter(conf.env_filter()).boxed());
        } else {
            layers.push(layer.with_filter(conf.env_filter()).boxed());
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| FlowdeskError::RuntimeError(format!("cannot init tracing: {e:?}")))?;
    tracing::info!("tracing initialized: {:?}", &conf);
    Ok(())
}
