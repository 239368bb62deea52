//! Configuration file loading for chatline
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `CHATLINE_` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./chatline.toml` or `./.chatline.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/chatline/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileGeminiConfig, FileLoggingConfig, FileOpenAiConfig,
    FilePersistenceConfig, FileProvidersConfig, FileReplConfig, FileStreamConfig,
    PersistenceBackend,
};
pub use loader::ConfigLoader;
