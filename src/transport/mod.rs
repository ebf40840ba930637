// src/transport/mod.rs
mod binder;
mod headers;
mod tls;
mod websocket;

pub use binder::TransportBinder;
pub use headers::{HttpRequestContext, RequestHeaders};
pub use tls::{
    validate_server_chain, ChainStatus, ChainVerifier, OpenSslChainVerifier,
    ServerCertificateValidator, TrustPolicy,
};
pub use websocket::{WebSocketOptions, DEFAULT_BUFFER_SIZE, DEFAULT_KEEP_ALIVE};
