//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted to adapter settings and
//! application parameters at startup.

mod logging;
mod persistence;
mod providers;
mod repl;
mod stream;

pub use logging::FileLoggingConfig;
pub use persistence::{FilePersistenceConfig, PersistenceBackend};
pub use providers::{FileGeminiConfig, FileOpenAiConfig, FileProvidersConfig};
pub use repl::FileReplConfig;
pub use stream::FileStreamConfig;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigValidationError {
    #[error("{field} cannot be empty")]
    EmptyUrl { field: &'static str },

    #[error("stream.inactivity_timeout_secs cannot be 0")]
    InvalidTimeout,

    #[error("stream.scroll_threshold must be positive, got {0}")]
    InvalidScrollThreshold(f32),

    #[error("persistence.user_id is required for the http backend")]
    MissingUser,
}

impl ConfigValidationError {
    /// Issues that would break every turn, not just one backend.
    ///
    /// A zero timeout expires before the first delta can arrive.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConfigValidationError::InvalidTimeout | ConfigValidationError::InvalidScrollThreshold(_)
        )
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub providers: FileProvidersConfig,
    pub persistence: FilePersistenceConfig,
    pub stream: FileStreamConfig,
    pub logging: FileLoggingConfig,
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();

        if self.providers.openai.base_url.trim().is_empty() {
            issues.push(ConfigValidationError::EmptyUrl {
                field: "providers.openai.base_url",
            });
        }
        if self.providers.gemini.base_url.trim().is_empty() {
            issues.push(ConfigValidationError::EmptyUrl {
                field: "providers.gemini.base_url",
            });
        }
        if self.persistence.backend == PersistenceBackend::Http {
            if self.persistence.api_url.trim().is_empty() {
                issues.push(ConfigValidationError::EmptyUrl {
                    field: "persistence.api_url",
                });
            }
            if self.persistence.user_id.as_deref().is_none_or(str::is_empty) {
                issues.push(ConfigValidationError::MissingUser);
            }
        }

        if self.stream.inactivity_timeout_secs == 0 {
            issues.push(ConfigValidationError::InvalidTimeout);
        }
        if self.stream.scroll_threshold <= 0.0 || self.stream.scroll_threshold.is_nan() {
            issues.push(ConfigValidationError::InvalidScrollThreshold(
                self.stream.scroll_threshold,
            ));
        }

        issues
    }
}
