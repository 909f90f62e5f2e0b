//! Utility modules: retry, timeout, URL helpers.

pub mod retry;
pub mod timeout;
pub mod url;
