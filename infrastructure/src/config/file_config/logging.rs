//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Diagnostic log file; stderr only when unset.
    pub file: Option<String>,
    /// JSONL transcript of turn events.
    pub conversation_log: Option<String>,
    /// `tracing` filter directive used when `-v` is not given (e.g. "chatline=debug").
    pub filter: Option<String>,
}
