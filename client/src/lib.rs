pub mod client;
pub mod config;
pub mod error;
pub mod registry;

pub use client::JobServerClient;
pub use config::{
    ArtifactRoute, ClientConfig, ConfigLayer, LoggingConfig, ServerConfig, TransportConfig,
};
pub use error::ClientError;
pub use registry::ClientRegistry;

pub use common;
