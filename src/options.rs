// src/options.rs
use crate::auth::AuthStrategy;
use crate::cert::ClientCertificate;
use crate::config::{DEFAULT_CREDENTIAL_WAIT_SECS, DEFAULT_NAMESPACE};
use crate::error::{KubeError, Result};
use crate::transport::TrustPolicy;
use openssl::x509::X509;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Everything needed to open authenticated connections to one API server.
#[derive(Clone)]
pub struct ConnectionOptions {
    pub endpoint: Url,
    pub namespace: String,
    pub ca_certificate: Option<X509>,
    pub allow_insecure: bool,
    pub auth_strategy: AuthStrategy,
    pub client_certificate: Option<ClientCertificate>,
    pub log_headers: bool,
    /// Upper bound on how long a request waits for credential material.
    pub credential_wait: Duration,
}

impl ConnectionOptions {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ca_certificate: None,
            allow_insecure: false,
            auth_strategy: AuthStrategy::None,
            client_certificate: None,
            log_headers: false,
            credential_wait: Duration::from_secs(DEFAULT_CREDENTIAL_WAIT_SECS),
        }
    }

    /// Authenticates with a client certificate; replaces any other strategy.
    pub fn with_client_certificate(mut self, certificate: ClientCertificate) -> Self {
        self.auth_strategy = AuthStrategy::ClientCertificate(certificate.clone());
        self.client_certificate = Some(certificate);
        self
    }

    pub fn ensure_valid(&self) -> Result<()> {
        match self.endpoint.scheme() {
            "https" | "http" => {}
            other => {
                return Err(KubeError::InvalidEndpoint {
                    endpoint: self.endpoint.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        }
        if self.endpoint.host_str().map_or(true, str::is_empty) {
            return Err(KubeError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: "missing host".to_string(),
            });
        }

        if self.namespace.trim().is_empty() {
            return Err(KubeError::InvalidOptions(
                "namespace must not be empty".to_string(),
            ));
        }

        if self.credential_wait.is_zero() {
            return Err(KubeError::InvalidOptions(
                "credential wait must be greater than zero".to_string(),
            ));
        }

        if let Some(certificate) = &self.client_certificate {
            certificate.validate()?;
            if !matches!(
                self.auth_strategy,
                AuthStrategy::ClientCertificate(_) | AuthStrategy::None
            ) {
                return Err(KubeError::InvalidAuthConfiguration(format!(
                    "a client certificate cannot be combined with {} authentication",
                    self.auth_strategy.kind()
                )));
            }
        }

        self.auth_strategy.validate()
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::for_options(self)
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("endpoint", &self.endpoint.as_str())
            .field("namespace", &self.namespace)
            .field(
                "ca_certificate",
                &self
                    .ca_certificate
                    .as_ref()
                    .map(|ca| crate::cert::certificate_subject(ca)),
            )
            .field("allow_insecure", &self.allow_insecure)
            .field("auth_strategy", &self.auth_strategy)
            .field("client_certificate", &self.client_certificate)
            .field("log_headers", &self.log_headers)
            .field("credential_wait", &self.credential_wait)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::testing::{generate_ca, generate_key, generate_leaf};

    fn options() -> ConnectionOptions {
        ConnectionOptions::new(Url::parse("https://10.0.0.1:6443").unwrap())
    }

    #[test]
    fn defaults_are_valid() {
        let options = options();
        assert_eq!(options.namespace, "default");
        assert!(options.ensure_valid().is_ok());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let mut options = options();
        options.endpoint = Url::parse("ftp://10.0.0.1").unwrap();
        assert!(matches!(
            options.ensure_valid(),
            Err(KubeError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn rejects_empty_namespace() {
        let mut options = options();
        options.namespace = "  ".to_string();
        assert!(matches!(
            options.ensure_valid(),
            Err(KubeError::InvalidOptions(_))
        ));
    }

    #[test]
    fn client_certificate_needs_matching_key() {
        let (ca, ca_key) = generate_ca("test-ca");
        let (leaf, _) = generate_leaf("admin", &ca, &ca_key);

        let options = options().with_client_certificate(ClientCertificate::new(leaf, Some(generate_key())));
        assert!(matches!(
            options.ensure_valid(),
            Err(KubeError::CertificateLoadFailure { .. })
        ));
    }

    #[test]
    fn client_certificate_with_token_is_mixed_mode() {
        let (ca, ca_key) = generate_ca("test-ca");
        let (leaf, key) = generate_leaf("admin", &ca, &ca_key);

        let mut options = options().with_client_certificate(ClientCertificate::new(leaf, Some(key)));
        assert!(options.ensure_valid().is_ok());

        options.auth_strategy = AuthStrategy::BearerToken {
            token: "abc123".to_string(),
        };
        assert!(matches!(
            options.ensure_valid(),
            Err(KubeError::InvalidAuthConfiguration(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_tokens() {
        let mut options = options();
        options.auth_strategy = AuthStrategy::BearerToken {
            token: "super-secret".to_string(),
        };
        assert!(!format!("{:?}", options).contains("super-secret"));
    }
}
