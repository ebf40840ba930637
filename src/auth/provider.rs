// src/auth/provider.rs
//! Legacy `auth-provider` credential commands (e.g. `gcloud config config-helper`).
use super::credential::{parse_timestamp, Credential};
use super::runner::{CommandInvocation, CommandRunner};
use super::CredentialCommand;
use crate::error::{KubeError, Result};
use crate::kubeconfig::AuthProviderConfig;
use crate::utils::Logger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Clone, Default, PartialEq)]
pub struct AuthProviderCommand {
    pub provider_name: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub token_selector: Option<String>,
    pub expiry_selector: Option<String>,
    pub initial_token: Option<String>,
    pub initial_expiry: Option<DateTime<Utc>>,
}

impl AuthProviderCommand {
    pub fn from_config(provider: &AuthProviderConfig) -> Result<Self> {
        let initial_expiry = match provider.value("expiry") {
            Some(raw) => Some(parse_timestamp(&raw).ok_or_else(|| {
                KubeError::InvalidAuthConfiguration(format!(
                    "auth provider '{}' has an unparseable expiry '{}'",
                    provider.name, raw
                ))
            })?),
            None => None,
        };

        Ok(Self {
            provider_name: provider.name.clone(),
            command: provider.value("cmd-path"),
            args: provider
                .value("cmd-args")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            token_selector: provider.value("token-key"),
            expiry_selector: provider.value("expiry-key"),
            initial_token: provider.value("access-token"),
            initial_expiry,
        })
    }

    /// Seed credential from `access-token`/`expiry`, if one was configured.
    pub fn initial_credential(&self) -> Option<Credential> {
        self.initial_token
            .as_ref()
            .map(|token| Credential::bearer(token.clone(), self.initial_expiry))
    }

    pub fn parse_output(&self, stdout: &str) -> Result<Credential> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Err(KubeError::ExecPluginOutputInvalid(format!(
                "'{}' produced no output",
                self.describe()
            )));
        }

        let Some(token_selector) = &self.token_selector else {
            return Ok(Credential::bearer(trimmed, None));
        };

        let document: Value = serde_json::from_str(trimmed).map_err(|e| {
            KubeError::ExecPluginOutputInvalid(format!(
                "output of '{}' is not valid JSON: {}",
                self.describe(),
                e
            ))
        })?;

        let token = select(&document, token_selector)
            .and_then(Value::as_str)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                KubeError::ExecPluginOutputInvalid(format!(
                    "no access token found at '{}'",
                    token_selector
                ))
            })?;

        let expires_at = match &self.expiry_selector {
            Some(expiry_selector) => {
                let raw = select(&document, expiry_selector)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        KubeError::ExecPluginOutputInvalid(format!(
                            "no token expiry found at '{}'",
                            expiry_selector
                        ))
                    })?;
                Some(parse_timestamp(raw).ok_or_else(|| {
                    KubeError::ExecPluginOutputInvalid(format!(
                        "token expiry '{}' is not an RFC3339 timestamp",
                        raw
                    ))
                })?)
            }
            None => None,
        };

        Ok(Credential::bearer(token.trim(), expires_at))
    }
}

#[async_trait]
impl CredentialCommand for AuthProviderCommand {
    fn describe(&self) -> String {
        match &self.command {
            Some(command) => command.clone(),
            None => format!("auth provider '{}'", self.provider_name),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.command.is_none() && self.initial_token.is_none() {
            return Err(KubeError::InvalidAuthConfiguration(format!(
                "auth provider '{}' needs either cmd-path or access-token",
                self.provider_name
            )));
        }
        Ok(())
    }

    async fn fetch(&self, runner: &dyn CommandRunner, logger: &dyn Logger) -> Result<Credential> {
        let command = self.command.as_ref().ok_or_else(|| {
            KubeError::InvalidAuthConfiguration(format!(
                "the access token for auth provider '{}' expired and no cmd-path is configured",
                self.provider_name
            ))
        })?;

        let invocation = CommandInvocation {
            program: command.clone(),
            args: self.args.clone(),
            ..CommandInvocation::default()
        };

        logger.debug_log(&format!(
            "Running auth provider command: {} {}",
            command,
            self.args.join(" ")
        ));

        let output = runner
            .run(&invocation)
            .await
            .map_err(|e| e.into_kube_error(command, None))?;

        if !output.success() {
            logger.log(&format!("Auth provider command {} failed", command));
            return Err(KubeError::ExecPluginFailure {
                command: command.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
                timed_out: false,
            });
        }

        self.parse_output(&output.stdout)
    }
}

impl std::fmt::Debug for AuthProviderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProviderCommand")
            .field("provider_name", &self.provider_name)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("token_selector", &self.token_selector)
            .field("expiry_selector", &self.expiry_selector)
            .field("initial_token", &self.initial_token.as_ref().map(|_| "<redacted>"))
            .field("initial_expiry", &self.initial_expiry)
            .finish()
    }
}

/// Splits a selector into path segments. Accepts slash paths
/// (`credential/access_token`) and Go-template style (`{.credential.access_token}`).
fn selector_segments(selector: &str) -> Vec<&str> {
    let trimmed = selector.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);
    let inner = inner.trim_start_matches('.');

    let separator = if inner.contains('/') { '/' } else { '.' };
    inner
        .split(separator)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn select<'a>(document: &'a Value, selector: &str) -> Option<&'a Value> {
    selector_segments(selector)
        .into_iter()
        .try_fold(document, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
