// src/auth/plugin.rs
//! `exec` credential plugins speaking the `client.authentication.k8s.io` protocol.
use super::credential::{parse_timestamp, Credential};
use super::runner::{CommandInvocation, CommandRunner};
use super::CredentialCommand;
use crate::cert::client_certificate_from_pem;
use crate::error::{KubeError, Result};
use crate::utils::Logger;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EXEC_INFO_ENV: &str = "KUBERNETES_EXEC_INFO";
pub const EXEC_CREDENTIAL_KIND: &str = "ExecCredential";
pub const SUPPORTED_API_VERSIONS: [&str; 3] = [
    "client.authentication.k8s.io/v1",
    "client.authentication.k8s.io/v1beta1",
    "client.authentication.k8s.io/v1alpha1",
];

/// Cluster details handed to plugins that set `provideClusterInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecClusterInfo {
    pub server: String,
    #[serde(
        rename = "certificate-authority-data",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
    #[serde(rename = "insecure-skip-tls-verify", skip_serializing_if = "is_false")]
    pub insecure_skip_tls_verify: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct ExecPlugin {
    pub api_version: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub install_hint: Option<String>,
    pub cluster: Option<ExecClusterInfo>,
}

impl std::fmt::Debug for ExecPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // env values may carry secrets
        f.debug_struct("ExecPlugin")
            .field("api_version", &self.api_version)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("install_hint", &self.install_hint)
            .field("cluster", &self.cluster)
            .finish()
    }
}

#[derive(Serialize)]
struct ExecInfo<'a> {
    #[serde(rename = "apiVersion")]
    api_version: &'a str,
    kind: &'a str,
    spec: ExecInfoSpec<'a>,
}

#[derive(Serialize)]
struct ExecInfoSpec<'a> {
    interactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster: Option<&'a ExecClusterInfo>,
}

#[derive(Debug, Deserialize)]
struct ExecCredentialResponse {
    #[serde(rename = "apiVersion", default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    status: Option<ExecCredentialStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    client_certificate_data: Option<String>,
    #[serde(default)]
    client_key_data: Option<String>,
    #[serde(default)]
    expiration_timestamp: Option<String>,
}

impl ExecPlugin {
    /// Value for `KUBERNETES_EXEC_INFO`.
    pub fn exec_info(&self) -> Result<String> {
        let info = ExecInfo {
            api_version: &self.api_version,
            kind: EXEC_CREDENTIAL_KIND,
            spec: ExecInfoSpec {
                interactive: false,
                cluster: self.cluster.as_ref(),
            },
        };
        serde_json::to_string(&info)
            .map_err(|e| KubeError::InvalidAuthConfiguration(format!("cannot encode exec info: {}", e)))
    }

    pub fn invocation(&self) -> Result<CommandInvocation> {
        let mut env = self.env.clone();
        env.insert(EXEC_INFO_ENV.to_string(), self.exec_info()?);
        Ok(CommandInvocation {
            program: self.command.clone(),
            args: self.args.clone(),
            env,
        })
    }

    pub fn parse_output(&self, stdout: &str) -> Result<Credential> {
        let response: ExecCredentialResponse = serde_json::from_str(stdout.trim()).map_err(|e| {
            KubeError::ExecPluginOutputInvalid(format!(
                "output of '{}' is not a valid ExecCredential: {}",
                self.command, e
            ))
        })?;

        if response.kind.as_deref() != Some(EXEC_CREDENTIAL_KIND) {
            return Err(KubeError::ExecPluginOutputInvalid(format!(
                "expected kind '{}', got '{}'",
                EXEC_CREDENTIAL_KIND,
                response.kind.unwrap_or_default()
            )));
        }

        if response.api_version.as_deref() != Some(self.api_version.as_str()) {
            return Err(KubeError::ExecPluginOutputInvalid(format!(
                "plugin returned apiVersion '{}' but '{}' was requested",
                response.api_version.unwrap_or_default(),
                self.api_version
            )));
        }

        let status = response.status.ok_or_else(|| {
            KubeError::ExecPluginOutputInvalid("missing required field 'status'".to_string())
        })?;

        let expires_at = match status.expiration_timestamp.as_deref() {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                KubeError::ExecPluginOutputInvalid(format!(
                    "status.expirationTimestamp '{}' is not an RFC3339 timestamp",
                    raw
                ))
            })?),
            None => None,
        };

        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match (
            non_empty(status.client_certificate_data),
            non_empty(status.client_key_data),
        ) {
            (Some(certificate_pem), Some(key_pem)) => {
                let certificate = client_certificate_from_pem(&certificate_pem, &key_pem)
                    .map_err(|e| KubeError::ExecPluginOutputInvalid(e.to_string()))?;
                Ok(Credential::certificate(certificate, expires_at))
            }
            (Some(_), None) | (None, Some(_)) => Err(KubeError::ExecPluginOutputInvalid(
                "status.clientCertificateData and status.clientKeyData must be set together"
                    .to_string(),
            )),
            (None, None) => {
                let token = non_empty(status.token).ok_or_else(|| {
                    KubeError::ExecPluginOutputInvalid(
                        "missing required field 'status.token'".to_string(),
                    )
                })?;
                Ok(Credential::bearer(token, expires_at))
            }
        }
    }
}

#[async_trait]
impl CredentialCommand for ExecPlugin {
    fn describe(&self) -> String {
        self.command.clone()
    }

    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(KubeError::InvalidAuthConfiguration(
                "exec plugin has no command".to_string(),
            ));
        }
        if !SUPPORTED_API_VERSIONS.contains(&self.api_version.as_str()) {
            return Err(KubeError::InvalidAuthConfiguration(format!(
                "exec plugin apiVersion '{}' is not supported (expected one of {})",
                self.api_version,
                SUPPORTED_API_VERSIONS.join(", ")
            )));
        }
        Ok(())
    }

    async fn fetch(&self, runner: &dyn CommandRunner, logger: &dyn Logger) -> Result<Credential> {
        let invocation = self.invocation()?;
        logger.debug_log(&format!(
            "Running credential plugin: {} {}",
            self.command,
            self.args.join(" ")
        ));

        let output = runner
            .run(&invocation)
            .await
            .map_err(|e| e.into_kube_error(&self.command, self.install_hint.as_deref()))?;

        if !output.success() {
            logger.log(&format!(
                "Credential plugin {} exited with {:?}",
                self.command, output.exit_code
            ));
            return Err(KubeError::ExecPluginFailure {
                command: self.command.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
                timed_out: false,
            });
        }

        self.parse_output(&output.stdout)
    }
}
