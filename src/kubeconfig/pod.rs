// src/kubeconfig/pod.rs
//! In-cluster bootstrap from the service account mounted into every pod.
use crate::auth::AuthStrategy;
use crate::cert::{load_certificate, MaterialSource};
use crate::config::DEFAULT_NAMESPACE;
use crate::error::{KubeError, Result};
use crate::options::ConnectionOptions;
use std::fs;
use std::net::Ipv6Addr;
use std::path::Path;
use url::Url;

pub const DEFAULT_SERVICE_ACCOUNT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

const TOKEN_FILE: &str = "token";
const CA_FILE: &str = "ca.crt";
const NAMESPACE_FILE: &str = "namespace";

/// API server location as injected into the pod environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodEnvironment {
    pub service_host: Option<String>,
    pub service_port: Option<String>,
}

impl PodEnvironment {
    pub fn from_process_env() -> Self {
        Self {
            service_host: std::env::var(SERVICE_HOST_ENV).ok(),
            service_port: std::env::var(SERVICE_PORT_ENV).ok(),
        }
    }

    pub fn is_in_cluster(&self) -> bool {
        self.host().is_some() && self.port().is_some()
    }

    fn host(&self) -> Option<&str> {
        self.service_host.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }

    fn port(&self) -> Option<&str> {
        self.service_port.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    pub fn api_endpoint(&self) -> Result<Url> {
        let (host, port) = match (self.host(), self.port()) {
            (Some(host), Some(port)) => (host, port),
            _ => {
                return Err(KubeError::ServiceAccountUnavailable(format!(
                    "{} and {} must both be set",
                    SERVICE_HOST_ENV, SERVICE_PORT_ENV
                )))
            }
        };

        let host = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let endpoint = format!("https://{}:{}", host, port);
        Url::parse(&endpoint).map_err(|e| KubeError::InvalidEndpoint {
            endpoint,
            reason: e.to_string(),
        })
    }
}

impl ConnectionOptions {
    /// Builds options from a mounted service account directory (normally
    /// [`DEFAULT_SERVICE_ACCOUNT_PATH`]).
    pub fn from_pod_service_account(
        env: &PodEnvironment,
        service_account_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let dir = service_account_dir.as_ref();
        let endpoint = env.api_endpoint()?;

        let token_path = dir.join(TOKEN_FILE);
        let token = fs::read_to_string(&token_path).map_err(|e| {
            KubeError::ServiceAccountUnavailable(format!(
                "cannot read {}: {}",
                token_path.display(),
                e
            ))
        })?;

        let ca_path = dir.join(CA_FILE);
        if !ca_path.is_file() {
            return Err(KubeError::ServiceAccountUnavailable(format!(
                "{} does not exist",
                ca_path.display()
            )));
        }
        let ca_certificate = load_certificate(&MaterialSource::File(&ca_path))?;

        let namespace = fs::read_to_string(dir.join(NAMESPACE_FILE))
            .ok()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let mut options = ConnectionOptions::new(endpoint);
        options.namespace = namespace;
        options.ca_certificate = Some(ca_certificate);
        options.auth_strategy = AuthStrategy::BearerToken {
            token: token.trim().to_string(),
        };
        options.ensure_valid()?;
        Ok(options)
    }
}
