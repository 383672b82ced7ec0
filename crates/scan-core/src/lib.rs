//! Building blocks of the single-switch scanning speller: settings, switch
//! debouncing, the cooperative scan clock, scan trees, the text buffer and
//! word prediction.

pub mod clock;
pub mod prediction;
pub mod settings;
pub mod switch;
pub mod text_buffer;
pub mod tree;

/// Milliseconds on the session's monotonic clock.
pub type Timestamp = u64;
