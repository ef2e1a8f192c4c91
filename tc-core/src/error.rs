//! Error types
//!
//! Re-exports the shared error enum so callers only need `tc_core`.

pub use tc_error::{Result, ThermoctlError};
