// src/auth/mod.rs
mod cache;
mod credential;
mod plugin;
mod provider;
mod refreshable;
mod runner;
mod strategy;

pub use cache::CredentialCache;
pub use credential::{
    encode_basic, parse_timestamp, Credential, CredentialSecret, CredentialTarget,
    AUTHORIZATION_HEADER,
};
pub use plugin::{ExecClusterInfo, ExecPlugin, EXEC_INFO_ENV, SUPPORTED_API_VERSIONS};
pub use provider::AuthProviderCommand;
pub use refreshable::RefreshableCredential;
pub use runner::{CommandError, CommandInvocation, CommandOutput, CommandRunner, TokioCommandRunner};
pub use strategy::AuthStrategy;

use crate::error::Result;
use crate::utils::Logger;
use async_trait::async_trait;

/// An external command that mints credentials.
#[async_trait]
pub trait CredentialCommand: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Short name for log and error messages.
    fn describe(&self) -> String;
    fn validate(&self) -> Result<()>;
    async fn fetch(&self, runner: &dyn CommandRunner, logger: &dyn Logger) -> Result<Credential>;
}
