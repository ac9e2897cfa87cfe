//! Plain-text reporting of fit results.

pub mod format;

pub use format::*;
