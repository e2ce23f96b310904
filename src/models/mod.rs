//! Models Module - Data Structures & Configuration
//!
//! Single source of truth for the data layer's types, error taxonomy,
//! and per-key-class configuration.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
