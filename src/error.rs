// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors raised while resolving a kubeconfig context or authenticating a request.
///
/// Every variant carries owned text so a single refresh outcome can be handed
/// to all callers waiting on it.
#[derive(Debug, Clone, Error)]
pub enum KubeError {
    #[error("no context was specified and the configuration has no current context")]
    NoContextSpecified,

    #[error("cannot find a context named '{0}'")]
    ContextNotFound(String),

    #[error("cannot find a cluster named '{0}'")]
    ClusterNotFound(String),

    #[error("cannot find a user identity named '{0}'")]
    UserNotFound(String),

    #[error("invalid authentication configuration: {0}")]
    InvalidAuthConfiguration(String),

    #[error("failed to load certificate material from {source_name}: {reason}")]
    CertificateLoadFailure { source_name: String, reason: String },

    #[error("{}", describe_exec_failure(.command, .exit_code, .stderr, .timed_out))]
    ExecPluginFailure {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
        timed_out: bool,
    },

    #[error("credential plugin produced invalid output: {0}")]
    ExecPluginOutputInvalid(String),

    #[error("failed to refresh credential: {0}")]
    CredentialRefreshFailure(Box<KubeError>),

    #[error("server certificate validation failed: {0}")]
    TlsValidationFailure(String),

    #[error("invalid API endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid connection options: {0}")]
    InvalidOptions(String),

    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoadFailure { path: String, reason: String },

    #[error("pod service account is unavailable: {0}")]
    ServiceAccountUnavailable(String),
}

impl KubeError {
    pub fn certificate_load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        KubeError::CertificateLoadFailure {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config_load(path: impl Into<String>, reason: impl ToString) -> Self {
        KubeError::ConfigLoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Unwraps a `CredentialRefreshFailure` to the error that caused it.
    pub fn root_cause(&self) -> &KubeError {
        match self {
            KubeError::CredentialRefreshFailure(inner) => inner.root_cause(),
            other => other,
        }
    }
}

const STDERR_EXCERPT_LEN: usize = 512;

fn describe_exec_failure(
    command: &str,
    exit_code: &Option<i32>,
    stderr: &str,
    timed_out: &bool,
) -> String {
    let mut message = if *timed_out {
        format!("credential command '{}' timed out", command)
    } else {
        match exit_code {
            Some(code) => format!("credential command '{}' exited with status {}", command, code),
            None => format!("credential command '{}' failed", command),
        }
    };

    let stderr = stderr.trim();
    if !stderr.is_empty() {
        let excerpt: String = stderr.chars().take(STDERR_EXCERPT_LEN).collect();
        message.push_str(": ");
        message.push_str(&excerpt);
    }
    message
}
