// src/lib.rs
//! Resolves kubeconfig contexts into authenticated connection settings and
//! keeps command-backed credentials fresh.
pub mod auth;
pub mod cert;
pub mod config;
pub mod error;
pub mod kubeconfig;
pub mod options;
pub mod transport;
pub mod utils;

pub use auth::{AuthStrategy, Credential, CredentialTarget};
pub use config::ClientSettings;
pub use error::{KubeError, Result};
pub use kubeconfig::{resolve, KubeConfig, PodEnvironment, Resolver};
pub use options::ConnectionOptions;
pub use transport::{HttpRequestContext, TransportBinder, WebSocketOptions};
