//! Sui Pulse HTTP API Module
//! Dashboard feeds served through the resilient data layer

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::{AppState, Upstreams};
pub use routes::create_router;
pub use types::*;
