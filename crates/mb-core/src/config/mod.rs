//! Configuration loading and validation.
//!
//! The configuration is a TOML file; every key is optional:
//!
//! ```toml
//! ingest_capacity = 8192
//! holddown_secs = 900
//! max_batch_size = 1024
//! pre_trigger_depth = 16
//! trigger_threshold = "WARN"
//! addressing = "smtp://mail.example.com?submission"
//! subject_template = "%events{triggering} of %events{total} (lost %events{lost})"
//!
//! [mail]
//! to = ["ops@example.com"]
//! priority = "high"
//!
//! [report]
//! title = "Production alerts"
//! ```

pub mod resolve;

pub use resolve::{resolve_config_path, xdg_config_path, ConfigSource, ENV_CONFIG_PATH};

use std::path::{Path, PathBuf};
use std::time::Duration;

use mb_common::Level;
use mb_report::{HtmlTransform, ReportConfig};
use mb_transport::{
    default_sender, transport_for, Addressing, Mailbox, Priority, TransportError, SMTP_CONFIG_ENV,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::engine::{
    EngineSettings, DEFAULT_HOLDDOWN, DEFAULT_INGEST_CAPACITY, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_POLL_CEILING, DEFAULT_PRE_TRIGGER_DEPTH, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_SUBJECT_TEMPLATE,
};
use crate::sink::{Envelope, MailSink};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("invalid addressing: {0}")]
    Addressing(#[from] TransportError),
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io { .. } => 60,
            ConfigError::Parse { .. } => 61,
            ConfigError::InvalidValue { .. } => 65,
            ConfigError::Addressing(_) => 67,
        }
    }

    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Envelope section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub to: Vec<Mailbox>,
    /// Defaults to `mailbatch <mailbatch@HOST>`.
    pub from: Option<Mailbox>,
    pub reply_to: Option<Mailbox>,
    pub priority: Priority,
}

/// Complete engine and delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Ingest channel capacity; 0 means unbounded.
    pub ingest_capacity: usize,
    pub holddown_secs: u64,
    pub max_batch_size: usize,
    pub pre_trigger_depth: usize,
    pub trigger_threshold: Level,
    pub poll_ceiling_secs: u64,
    pub shutdown_timeout_secs: u64,
    /// Delivery target; see [`Addressing`].
    pub addressing: Option<Addressing>,
    pub subject_template: String,
    pub mail: MailConfig,
    pub report: ReportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            ingest_capacity: DEFAULT_INGEST_CAPACITY,
            holddown_secs: DEFAULT_HOLDDOWN.as_secs(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            pre_trigger_depth: DEFAULT_PRE_TRIGGER_DEPTH,
            trigger_threshold: Level::Warn,
            poll_ceiling_secs: DEFAULT_POLL_CEILING.as_secs(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),
            addressing: None,
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            mail: MailConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse TOML text. `path` is only used in error messages.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides that take precedence over the file.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(SMTP_CONFIG_ENV) {
            if !value.trim().is_empty() {
                debug!(descriptor = %value, "addressing overridden from environment");
                self.addressing = Some(Addressing::parse(&value)?);
            }
        }
        Ok(())
    }

    /// The addressing in effect, falling back to the default descriptor.
    pub fn effective_addressing(&self) -> Result<Addressing, ConfigError> {
        match &self.addressing {
            Some(addressing) => Ok(addressing.clone()),
            None => Ok(Addressing::from_env()?),
        }
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.holddown_secs == 0 {
            return Err(ConfigError::invalid("holddown_secs", "must be greater than zero"));
        }
        if self.poll_ceiling_secs == 0 {
            return Err(ConfigError::invalid(
                "poll_ceiling_secs",
                "must be greater than zero",
            ));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::invalid(
                "max_batch_size",
                "must be greater than zero",
            ));
        }
        if self.mail.to.is_empty() {
            return Err(ConfigError::invalid("mail.to", "at least one recipient is required"));
        }
        self.effective_addressing()?.validate()?;
        Ok(())
    }

    /// Engine tuning derived from this config.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::default()
            .with_ingest_capacity(self.ingest_capacity)
            .with_holddown(Duration::from_secs(self.holddown_secs))
            .with_max_batch_size(self.max_batch_size)
            .with_pre_trigger_depth(self.pre_trigger_depth)
            .with_trigger_threshold(self.trigger_threshold)
            .with_poll_ceiling(Duration::from_secs(self.poll_ceiling_secs))
            .with_shutdown_timeout(Duration::from_secs(self.shutdown_timeout_secs))
            .with_subject_template(self.subject_template.clone())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Build the mail sink for this config.
    pub fn mail_sink(&self) -> Result<MailSink, ConfigError> {
        let addressing = self.effective_addressing()?;
        let transport = transport_for(&addressing)?;
        let envelope = Envelope {
            from: self.mail.from.clone().unwrap_or_else(default_sender),
            to: self.mail.to.clone(),
            reply_to: self.mail.reply_to.clone(),
            priority: self.mail.priority,
        };
        Ok(MailSink::new(
            self.report.layout.clone(),
            HtmlTransform::new(self.report.clone()),
            envelope,
            transport,
        ))
    }
}

/// A loaded configuration with provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve, read, apply environment overrides and validate.
pub fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let (path, source) = resolve_config_path(cli_path);

    let mut config = match &path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            EngineConfig::from_toml(&text, path)?
        }
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;

    debug!(source = %source, path = ?path, "configuration loaded");
    Ok(LoadedConfig {
        config,
        path,
        source,
    })
}
