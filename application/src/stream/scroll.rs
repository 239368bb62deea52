//! Scroll anchoring
//!
//! Decides, on each buffer update, whether the conversation view should follow
//! the newest output. A user scroll pauses following until the next
//! submission.

use crate::ports::viewport::ViewPort;
use chatline_domain::{AnchorState, ScrollOrigin, ScrollTarget};
use std::sync::Arc;
use tracing::trace;

pub struct ScrollAnchor {
    state: AnchorState,
    threshold: f32,
    viewport: Arc<dyn ViewPort>,
}

impl ScrollAnchor {
    pub fn new(viewport: Arc<dyn ViewPort>, threshold: f32) -> Self {
        Self {
            state: AnchorState::PinnedToBottom,
            threshold,
            viewport,
        }
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    /// Record a scroll. Only scrolls the user made detach the view.
    pub fn on_scroll(&mut self, origin: ScrollOrigin) {
        if origin == ScrollOrigin::User {
            self.state = AnchorState::ScrolledAway;
        }
    }

    /// A new submission always re-pins the view.
    pub fn on_submission(&mut self) {
        self.state = AnchorState::PinnedToBottom;
    }

    /// React to a buffer update. Returns true if an auto-scroll was issued.
    pub fn on_buffer_update(&mut self) -> bool {
        if self.state == AnchorState::ScrolledAway {
            return false;
        }

        let distance = self.viewport.metrics().distance_to_content();
        if distance < self.threshold {
            self.viewport.scroll_into_view(ScrollTarget::EndOfConversation);
            true
        } else {
            trace!(distance, threshold = self.threshold, "Skipping auto-scroll");
            false
        }
    }
}

impl std::fmt::Debug for ScrollAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollAnchor")
            .field("state", &self.state)
            .field("threshold", &self.threshold)
            .finish()
    }
}
