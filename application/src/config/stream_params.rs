//! Stream parameters — turn loop control.
//!
//! [`StreamParams`] groups the static parameters that control how
//! [`ChatTurnController`](crate::use_cases::chat_turn::ChatTurnController)
//! consumes a provider stream. These are application-layer concerns, not
//! domain policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default distance (layout units) under which the view keeps following output.
pub const DEFAULT_SCROLL_THRESHOLD: f32 = 200.0;

/// Stream loop control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Cancel a stream that produced no event for this long.
    pub inactivity_timeout: Duration,
    /// Auto-scroll margin accounting for layout padding and chunk jitter.
    pub scroll_threshold: f32,
    /// Save the partial answer of a stream that failed mid-way.
    pub persist_partial_answers: bool,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(60),
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
            persist_partial_answers: false,
        }
    }
}

impl StreamParams {
    // ==================== Builder Methods ====================

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_scroll_threshold(mut self, threshold: f32) -> Self {
        self.scroll_threshold = threshold;
        self
    }

    pub fn with_persist_partial_answers(mut self, enabled: bool) -> Self {
        self.persist_partial_answers = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = StreamParams::default();
        assert_eq!(params.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(params.scroll_threshold, 200.0);
        assert!(!params.persist_partial_answers);
    }

    #[test]
    fn test_builders() {
        let params = StreamParams::default()
            .with_inactivity_timeout(Duration::from_millis(50))
            .with_persist_partial_answers(true);
        assert_eq!(params.inactivity_timeout, Duration::from_millis(50));
        assert!(params.persist_partial_answers);
    }
}
