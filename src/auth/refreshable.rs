// src/auth/refreshable.rs
use super::cache::CredentialCache;
use super::credential::Credential;
use super::runner::CommandRunner;
use super::CredentialCommand;
use crate::error::{KubeError, Result};
use crate::utils::SharedLogger;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

/// A credential minted by an external command and cached until it nears expiry.
pub struct RefreshableCredential<C> {
    command: C,
    cache: CredentialCache,
    runner: Arc<dyn CommandRunner>,
    logger: SharedLogger,
    refresh_margin: Duration,
}

impl<C: CredentialCommand> RefreshableCredential<C> {
    pub fn new(
        command: C,
        initial: Option<Credential>,
        runner: Arc<dyn CommandRunner>,
        logger: SharedLogger,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            command,
            cache: CredentialCache::new(initial),
            runner,
            logger,
            refresh_margin,
        }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn cached(&self) -> Option<Credential> {
        self.cache.current()
    }

    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    pub fn validate(&self) -> Result<()> {
        self.command.validate()
    }

    pub fn describe(&self) -> String {
        self.command.describe()
    }

    /// Returns the cached credential, running the command when it is missing
    /// or within the refresh margin of its expiry.
    pub async fn resolve(&self, now: DateTime<Utc>) -> Result<Credential> {
        let command = self.command.clone();
        let runner = Arc::clone(&self.runner);
        let logger = Arc::clone(&self.logger);

        self.cache
            .get_or_refresh(now, self.refresh_margin, move || async move {
                logger.debug_log(&format!("Refreshing credential via {}", command.describe()));
                let result = command.fetch(runner.as_ref(), logger.as_ref()).await;
                match &result {
                    Ok(credential) => logger.debug_log(&format!(
                        "Obtained credential from {} (expires: {})",
                        command.describe(),
                        credential
                            .expires_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "never".to_string())
                    )),
                    Err(e) => logger.log(&format!(
                        "Credential refresh via {} failed: {}",
                        command.describe(),
                        e
                    )),
                }
                result
            })
            .await
            .map_err(|e| match e {
                KubeError::CredentialRefreshFailure(_) => e,
                other => KubeError::CredentialRefreshFailure(Box::new(other)),
            })
    }
}

impl<C: Clone> Clone for RefreshableCredential<C> {
    fn clone(&self) -> Self {
        Self {
            command: self.command.clone(),
            cache: self.cache.snapshot(),
            runner: Arc::clone(&self.runner),
            logger: Arc::clone(&self.logger),
            refresh_margin: self.refresh_margin,
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for RefreshableCredential<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableCredential")
            .field("command", &self.command)
            .field("cached", &self.cache.current())
            .field("refresh_margin", &self.refresh_margin)
            .finish()
    }
}
