//! Configuration loading, logging set-up and small file helpers.

pub mod config;
pub mod logging;
pub mod utils;
