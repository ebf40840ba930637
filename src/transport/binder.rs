// src/transport/binder.rs
use super::headers::HttpRequestContext;
use super::tls::{ChainVerifier, OpenSslChainVerifier, ServerCertificateValidator, TrustPolicy};
use super::websocket::WebSocketOptions;
use crate::auth::{Credential, CredentialTarget};
use crate::error::{KubeError, Result};
use crate::options::ConnectionOptions;
use crate::utils::{null_logger, SharedLogger};
use chrono::Utc;
use std::sync::Arc;

/// Applies one resolved set of [`ConnectionOptions`] to plain requests and
/// WebSocket handshakes alike.
pub struct TransportBinder {
    options: ConnectionOptions,
    logger: SharedLogger,
    verifier: Arc<dyn ChainVerifier>,
}

impl TransportBinder {
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        options.ensure_valid()?;
        Ok(Self {
            options,
            logger: null_logger(),
            verifier: Arc::new(OpenSslChainVerifier),
        })
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_chain_verifier(mut self, verifier: Arc<dyn ChainVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Current credential, waiting at most `credential_wait` for a refresh.
    pub async fn current_credential(&self) -> Result<Option<Credential>> {
        let strategy = &self.options.auth_strategy;
        let wait = self.options.credential_wait;

        match tokio::time::timeout(wait, strategy.resolve_credential(Utc::now())).await {
            Ok(result) => result,
            Err(_) => {
                self.logger.log(&format!(
                    "Gave up waiting {}s for {} credential",
                    wait.as_secs(),
                    strategy.kind()
                ));
                Err(KubeError::CredentialRefreshFailure(Box::new(
                    KubeError::ExecPluginFailure {
                        command: strategy.command_name(),
                        exit_code: None,
                        stderr: String::new(),
                        timed_out: true,
                    },
                )))
            }
        }
    }

    /// Attaches the current credential to `target`.
    pub async fn authenticate<T>(&self, target: &mut T) -> Result<()>
    where
        T: CredentialTarget + Send + ?Sized,
    {
        let Some(credential) = self.current_credential().await? else {
            // A certificate attached to options without a strategy still goes out.
            if let Some(certificate) = &self.options.client_certificate {
                target.add_client_certificate(certificate.clone());
            }
            return Ok(());
        };

        if self.options.log_headers && credential.authorization_header().is_some() {
            self.logger
                .debug_log("Setting request header Authorization: <redacted>");
        }
        credential.apply_to(target);
        Ok(())
    }

    pub async fn prepare_request(&self) -> Result<HttpRequestContext> {
        let mut request = HttpRequestContext::new();
        self.authenticate(&mut request).await?;
        Ok(request)
    }

    pub async fn websocket_options(&self) -> Result<WebSocketOptions> {
        let mut options = WebSocketOptions {
            server_certificate_validator: self.server_certificate_validator(),
            ..WebSocketOptions::default()
        };
        self.authenticate(&mut options).await?;
        if self.options.log_headers {
            let names: Vec<&str> = options.request_headers.names().collect();
            self.logger
                .debug_log(&format!("WebSocket handshake headers: {}", names.join(", ")));
        }
        Ok(options)
    }

    /// `None` means the platform's default verification applies.
    pub fn server_certificate_validator(&self) -> Option<ServerCertificateValidator> {
        match self.options.trust_policy() {
            TrustPolicy::PlatformRoots => None,
            policy => Some(ServerCertificateValidator::new(
                policy,
                Arc::clone(&self.verifier),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        AuthStrategy, CommandError, CommandInvocation, CommandOutput, CommandRunner, ExecPlugin,
        RefreshableCredential,
    };
    use crate::cert::testing::{generate_ca, generate_leaf};
    use crate::cert::ClientCertificate;
    use crate::transport::ChainStatus;
    use crate::utils::MemoryLogger;
    use async_trait::async_trait;
    use std::time::Duration;
    use url::Url;

    fn options(strategy: AuthStrategy) -> ConnectionOptions {
        let mut options = ConnectionOptions::new(Url::parse("https://10.0.0.1:6443").unwrap());
        options.auth_strategy = strategy;
        options
    }

    struct HangingRunner;

    #[async_trait]
    impl CommandRunner for HangingRunner {
        async fn run(
            &self,
            _invocation: &CommandInvocation,
        ) -> std::result::Result<CommandOutput, CommandError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(CommandError::TimedOut)
        }
    }

    #[tokio::test]
    async fn basic_header_on_requests_and_handshakes() {
        let binder = TransportBinder::new(options(AuthStrategy::Basic {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }))
        .unwrap();

        let request = binder.prepare_request().await.unwrap();
        let websocket = binder.websocket_options().await.unwrap();

        assert_eq!(
            request.headers.get("Authorization"),
            Some("Basic YWRtaW46c2VjcmV0")
        );
        assert_eq!(
            websocket.request_headers.get("authorization"),
            request.headers.get("authorization")
        );
    }

    #[tokio::test]
    async fn none_strategy_leaves_request_untouched() {
        let binder = TransportBinder::new(options(AuthStrategy::None)).unwrap();
        let request = binder.prepare_request().await.unwrap();
        assert!(request.headers.is_empty());
        assert!(request.client_certificates.is_empty());
    }

    #[tokio::test]
    async fn client_certificate_is_attached_not_sent_as_header() {
        let (ca, ca_key) = generate_ca("users-ca");
        let (leaf, key) = generate_leaf("admin", &ca, &ca_key);
        let certificate = ClientCertificate::new(leaf, Some(key));
        let options = ConnectionOptions::new(Url::parse("https://10.0.0.1:6443").unwrap())
            .with_client_certificate(certificate);
        let binder = TransportBinder::new(options).unwrap();

        let websocket = binder.websocket_options().await.unwrap();
        assert_eq!(websocket.client_certificates.len(), 1);
        assert!(websocket.request_headers.is_empty());
    }

    #[tokio::test]
    async fn attached_certificate_without_strategy_is_still_sent() {
        let (ca, ca_key) = generate_ca("users-ca");
        let (leaf, key) = generate_leaf("admin", &ca, &ca_key);
        let mut options = options(AuthStrategy::None);
        options.client_certificate = Some(ClientCertificate::new(leaf, Some(key)));
        let binder = TransportBinder::new(options).unwrap();

        let request = binder.prepare_request().await.unwrap();
        let websocket = binder.websocket_options().await.unwrap();

        assert_eq!(request.client_certificates.len(), 1);
        assert_eq!(websocket.client_certificates.len(), 1);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let result = TransportBinder::new(options(AuthStrategy::BearerToken {
            token: String::new(),
        }));
        assert!(matches!(
            result,
            Err(KubeError::InvalidAuthConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn hung_credential_helper_times_out() {
        let plugin = ExecPlugin {
            api_version: "client.authentication.k8s.io/v1".to_string(),
            command: "get-token".to_string(),
            ..ExecPlugin::default()
        };
        let strategy = AuthStrategy::CredentialPlugin(RefreshableCredential::new(
            plugin,
            None,
            Arc::new(HangingRunner),
            null_logger(),
            chrono::Duration::seconds(60),
        ));
        let mut options = options(strategy);
        options.credential_wait = Duration::from_millis(100);
        let binder = TransportBinder::new(options).unwrap();

        let err = binder.prepare_request().await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            KubeError::ExecPluginFailure { command, timed_out: true, .. } if command == "get-token"
        ));
    }

    #[tokio::test]
    async fn header_names_are_logged_without_values() {
        let logger = Arc::new(MemoryLogger::new());
        let mut options = options(AuthStrategy::BearerToken {
            token: "abc123".to_string(),
        });
        options.log_headers = true;
        let binder = TransportBinder::new(options)
            .unwrap()
            .with_logger(logger.clone());

        binder.websocket_options().await.unwrap();

        let entries = logger.entries();
        assert!(entries.iter().any(|entry| entry.contains("Authorization")));
        assert!(entries.iter().all(|entry| !entry.contains("abc123")));
    }

    #[test]
    fn validator_only_when_custom_trust_is_needed() {
        let binder = TransportBinder::new(options(AuthStrategy::None)).unwrap();
        assert!(binder.server_certificate_validator().is_none());

        let mut insecure = options(AuthStrategy::None);
        insecure.allow_insecure = true;
        let validator = TransportBinder::new(insecure)
            .unwrap()
            .server_certificate_validator()
            .unwrap();
        assert!(validator.accepts(&ChainStatus::Failed("expired".to_string()), &[]));
    }

    #[tokio::test]
    async fn websocket_validator_checks_against_configured_ca() {
        let (ca, ca_key) = generate_ca("cluster-ca");
        let (server, _) = generate_leaf("kube-apiserver", &ca, &ca_key);
        let (rogue_ca, rogue_key) = generate_ca("rogue-ca");
        let (rogue, _) = generate_leaf("kube-apiserver", &rogue_ca, &rogue_key);

        let mut options = options(AuthStrategy::None);
        options.ca_certificate = Some(ca);
        let binder = TransportBinder::new(options).unwrap();

        let websocket = binder.websocket_options().await.unwrap();
        let validator = websocket.server_certificate_validator.unwrap();
        assert!(validator.accepts(&ChainStatus::UnknownRoot, &[server]));
        assert!(!validator.accepts(&ChainStatus::UnknownRoot, &[rogue]));
    }
}
