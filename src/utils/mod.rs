//! Utils Module - Helper Functions & Shared Utilities
//!
//! Cache, constants, and telemetry shared across the application.

pub mod cache;
pub mod constants;
pub mod telemetry;

pub use cache::*;
pub use telemetry::*;
