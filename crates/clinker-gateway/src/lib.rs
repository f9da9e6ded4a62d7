//! Backend REST gateway for the Clinker assistant.
//!
//! Implements the agent's data gateway and chat-history sink over HTTP.

pub mod envelope;
pub mod http;

pub use envelope::ApiEnvelope;
pub use http::HttpDataGateway;
