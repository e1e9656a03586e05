//! Utility functions for URL resolution and display formatting.

pub mod avatar;
pub mod format;

// Re-export commonly used functions at module level
pub use avatar::avatar_url;
pub use format::{relative_time, truncate};
