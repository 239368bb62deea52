//! Stream configuration from TOML (`[stream]` section)

use chatline_application::{DEFAULT_SCROLL_THRESHOLD, StreamParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStreamConfig {
    /// Seconds without a stream event before the turn is abandoned.
    pub inactivity_timeout_secs: u64,
    pub scroll_threshold: f32,
    /// Save what arrived when a stream fails mid-way.
    pub persist_partial_answers: bool,
}

impl Default for FileStreamConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 60,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
            persist_partial_answers: false,
        }
    }
}

impl FileStreamConfig {
    pub fn to_stream_params(&self) -> StreamParams {
        StreamParams::default()
            .with_inactivity_timeout(Duration::from_secs(self.inactivity_timeout_secs))
            .with_scroll_threshold(self.scroll_threshold)
            .with_persist_partial_answers(self.persist_partial_answers)
    }
}
