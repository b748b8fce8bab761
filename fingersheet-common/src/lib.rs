//! # Fingersheet Common Library
//!
//! Shared code for the fingersheet crates:
//! - Error type used outside the HTTP layer
//! - Configuration profiles and layered resolution
//! - Upload folder initialization
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, Profile};
pub use error::{Error, Result};
