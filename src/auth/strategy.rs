// src/auth/strategy.rs
use super::credential::{Credential, CredentialTarget};
use super::plugin::ExecPlugin;
use super::provider::AuthProviderCommand;
use super::refreshable::RefreshableCredential;
use crate::cert::ClientCertificate;
use crate::error::{KubeError, Result};
use chrono::{DateTime, Utc};
use std::fmt;

/// How requests to the API server authenticate.
#[derive(Clone)]
pub enum AuthStrategy {
    None,
    Basic { username: String, password: String },
    BearerToken { token: String },
    /// Legacy `auth-provider` command producing refreshable bearer tokens.
    TokenProvider(RefreshableCredential<AuthProviderCommand>),
    ClientCertificate(ClientCertificate),
    /// `exec` plugin producing tokens or client certificates.
    CredentialPlugin(RefreshableCredential<ExecPlugin>),
}

impl AuthStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthStrategy::None => "none",
            AuthStrategy::Basic { .. } => "basic",
            AuthStrategy::BearerToken { .. } => "bearer-token",
            AuthStrategy::TokenProvider(_) => "auth-provider",
            AuthStrategy::ClientCertificate(_) => "client-certificate",
            AuthStrategy::CredentialPlugin(_) => "exec-plugin",
        }
    }

    /// The external command behind a refreshable strategy, else its kind.
    pub fn command_name(&self) -> String {
        match self {
            AuthStrategy::TokenProvider(provider) => provider.describe(),
            AuthStrategy::CredentialPlugin(plugin) => plugin.describe(),
            other => other.kind().to_string(),
        }
    }

    /// Static completeness checks; run before first use.
    pub fn validate(&self) -> Result<()> {
        match self {
            AuthStrategy::None => Ok(()),
            AuthStrategy::Basic { username, password } => {
                if username.is_empty() {
                    return Err(KubeError::InvalidAuthConfiguration(
                        "the username for basic authentication has not been configured".to_string(),
                    ));
                }
                if password.is_empty() {
                    return Err(KubeError::InvalidAuthConfiguration(
                        "the password for basic authentication has not been configured".to_string(),
                    ));
                }
                Ok(())
            }
            AuthStrategy::BearerToken { token } => {
                if token.trim().is_empty() {
                    return Err(KubeError::InvalidAuthConfiguration(
                        "the bearer token has not been configured".to_string(),
                    ));
                }
                Ok(())
            }
            AuthStrategy::TokenProvider(provider) => provider.validate(),
            AuthStrategy::ClientCertificate(certificate) => certificate.validate(),
            AuthStrategy::CredentialPlugin(plugin) => plugin.validate(),
        }
    }

    /// Current credential material, refreshing command-backed credentials
    /// when needed. `None` means requests go out unauthenticated.
    pub async fn resolve_credential(&self, now: DateTime<Utc>) -> Result<Option<Credential>> {
        let credential = match self {
            AuthStrategy::None => return Ok(None),
            AuthStrategy::Basic { username, password } => Credential::basic(username, password),
            AuthStrategy::BearerToken { token } => Credential::bearer(token.clone(), None),
            AuthStrategy::ClientCertificate(certificate) => {
                Credential::certificate(certificate.clone(), None)
            }
            AuthStrategy::TokenProvider(provider) => provider.resolve(now).await?,
            AuthStrategy::CredentialPlugin(plugin) => plugin.resolve(now).await?,
        };
        Ok(Some(credential))
    }

    pub async fn apply<T>(&self, target: &mut T, now: DateTime<Utc>) -> Result<()>
    where
        T: CredentialTarget + Send + ?Sized,
    {
        if let Some(credential) = self.resolve_credential(now).await? {
            credential.apply_to(target);
        }
        Ok(())
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::None => f.write_str("None"),
            AuthStrategy::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthStrategy::BearerToken { .. } => f
                .debug_struct("BearerToken")
                .field("token", &"<redacted>")
                .finish(),
            AuthStrategy::TokenProvider(provider) => {
                f.debug_tuple("TokenProvider").field(provider).finish()
            }
            AuthStrategy::ClientCertificate(certificate) => {
                f.debug_tuple("ClientCertificate").field(certificate).finish()
            }
            AuthStrategy::CredentialPlugin(plugin) => {
                f.debug_tuple("CredentialPlugin").field(plugin).finish()
            }
        }
    }
}
