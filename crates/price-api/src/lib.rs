//! House price prediction HTTP service
//!
//! The binary loads configuration and the model bundle, then serves the
//! router built here. Exposed as a library so integration tests can drive
//! the router directly.

pub mod api;
pub mod config;
