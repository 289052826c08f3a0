// Adapters layer: concrete implementations for external systems.

pub mod endpoints;
pub mod http;

pub use http::BackendClient;
