//! Application-level configuration.
//!
//! - [`StreamParams`] — stream loop control (inactivity timeout, scroll margin, partial answers)

pub mod stream_params;

pub use stream_params::{DEFAULT_SCROLL_THRESHOLD, StreamParams};
