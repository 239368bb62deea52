//! Viewport port
//!
//! The scrollable conversation view, injected into the scroll anchor instead
//! of being reached into directly.

use chatline_domain::{ScrollTarget, ViewportMetrics};

pub trait ViewPort: Send + Sync {
    /// Current geometry of the conversation view.
    fn metrics(&self) -> ViewportMetrics;

    /// Bring `target` into view.
    fn scroll_into_view(&self, target: ScrollTarget);
}

/// Viewport for headless use: always at the bottom, scrolling does nothing.
pub struct NoViewPort;

impl ViewPort for NoViewPort {
    fn metrics(&self) -> ViewportMetrics {
        ViewportMetrics::default()
    }

    fn scroll_into_view(&self, _target: ScrollTarget) {}
}
