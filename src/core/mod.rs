//! # Core Module
//!
//! Process-wide configuration shared by every feature.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release

pub mod config;

pub use config::Config;
