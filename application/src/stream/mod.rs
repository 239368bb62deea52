//! Stream consumption and the UI state derived from it.
//!
//! - [`accumulator::StreamAccumulator`] — ordered fold of provider fragments
//! - [`scroll::ScrollAnchor`] — auto-scroll decisions per buffer update

pub mod accumulator;
pub mod scroll;
