//! Utility modules for Sidekick

pub mod http;
pub mod logging;
