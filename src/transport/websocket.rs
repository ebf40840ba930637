// src/transport/websocket.rs
use super::headers::RequestHeaders;
use super::tls::ServerCertificateValidator;
use crate::auth::CredentialTarget;
use crate::cert::ClientCertificate;
use std::time::Duration;

pub const DEFAULT_BUFFER_SIZE: usize = 2048;
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Handshake settings for an upgraded (WebSocket) connection. Headers and
/// certificates must be final before the handshake starts.
#[derive(Debug, Clone)]
pub struct WebSocketOptions {
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub keep_alive_interval: Duration,
    pub requested_subprotocols: Vec<String>,
    pub request_headers: RequestHeaders,
    pub client_certificates: Vec<ClientCertificate>,
    pub server_certificate_validator: Option<ServerCertificateValidator>,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self {
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            receive_buffer_size: DEFAULT_BUFFER_SIZE,
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            requested_subprotocols: Vec::new(),
            request_headers: RequestHeaders::new(),
            client_certificates: Vec::new(),
            server_certificate_validator: None,
        }
    }
}

impl WebSocketOptions {
    pub fn add_subprotocol(&mut self, protocol: impl Into<String>) {
        let protocol = protocol.into();
        if !self.requested_subprotocols.contains(&protocol) {
            self.requested_subprotocols.push(protocol);
        }
    }

    pub fn set_request_header(&mut self, name: &str, value: impl Into<String>) {
        self.request_headers.set(name, value);
    }
}

impl CredentialTarget for WebSocketOptions {
    fn set_header(&mut self, name: &str, value: String) {
        self.request_headers.set(name, value);
    }

    fn add_client_certificate(&mut self, certificate: ClientCertificate) {
        self.client_certificates.push(certificate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = WebSocketOptions::default();
        assert_eq!(options.send_buffer_size, 2048);
        assert_eq!(options.receive_buffer_size, 2048);
        assert_eq!(options.keep_alive_interval, Duration::from_secs(5));
        assert!(options.server_certificate_validator.is_none());
    }

    #[test]
    fn subprotocols_are_not_duplicated() {
        let mut options = WebSocketOptions::default();
        options.add_subprotocol("v4.channel.k8s.io");
        options.add_subprotocol("v4.channel.k8s.io");
        options.add_subprotocol("channel.k8s.io");
        assert_eq!(
            options.requested_subprotocols,
            vec!["v4.channel.k8s.io", "channel.k8s.io"]
        );
    }

    #[test]
    fn request_headers_are_case_insensitive() {
        let mut options = WebSocketOptions::default();
        options.set_request_header("X-Stream-Protocol-Version", "v4");
        options.set_header("x-stream-protocol-version", "v5".to_string());
        assert_eq!(options.request_headers.len(), 1);
        assert_eq!(
            options.request_headers.get("X-STREAM-PROTOCOL-VERSION"),
            Some("v5")
        );
    }
}
