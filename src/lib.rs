//! Typed client for the NebuIA integrator API: batches, uploads, document status and search.

pub mod api;
pub mod client;
pub mod config;
pub mod listener;
pub mod models;
pub mod upload;

pub use api::IntegratorApi;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use listener::{DocumentHandler, Listener, ListenerHandle, Watch};
pub use upload::RetryPolicy;
