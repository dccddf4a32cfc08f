mod client;
pub mod config;
pub mod credentials;
mod errors;
pub mod refresh;
pub mod request;
pub mod telemetry;
pub mod transport;

pub use client::AuthenticatedHttpClient;
pub use config::{Config, ConfigLocation};
pub use credentials::{CredentialStore, Credentials, MemoryCredentialStore};
pub use errors::Error;
pub use request::{AuthRequest, RequestDescriptor, Response};
pub use transport::{ReqwestTransport, Transport};

#[cfg(test)]
mod tests;
