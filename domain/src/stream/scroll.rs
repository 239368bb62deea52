//! Scroll anchoring value objects

/// Whether the conversation view follows new output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorState {
    #[default]
    PinnedToBottom,
    ScrolledAway,
}

/// Who caused a scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOrigin {
    /// Wheel, keyboard or drag by the user.
    User,
    /// An auto-scroll this system performed.
    Programmatic,
}

/// Geometry of the conversation viewport, in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportMetrics {
    /// Bottom edge of the latest rendered content.
    pub content_bottom: f32,
    /// Bottom edge of the visible area.
    pub visible_bottom: f32,
}

impl ViewportMetrics {
    pub fn new(content_bottom: f32, visible_bottom: f32) -> Self {
        Self {
            content_bottom,
            visible_bottom,
        }
    }

    /// How far the latest content extends below the visible area.
    pub fn distance_to_content(&self) -> f32 {
        self.content_bottom - self.visible_bottom
    }
}

/// Element to bring into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    EndOfConversation,
}
