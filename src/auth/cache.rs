// src/auth/cache.rs
use super::credential::Credential;
use crate::error::{KubeError, Result};
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

type RefreshOutcome = Option<Result<Credential>>;

#[derive(Default)]
struct CacheState {
    cached: Option<Credential>,
    in_flight: Option<watch::Receiver<RefreshOutcome>>,
}

/// Cached credential with single-flight refresh.
///
/// The first caller that finds the cached value stale spawns the refresh;
/// everyone else arriving while it runs waits on the same outcome. A failed
/// refresh is handed to all waiters but never cached, so the next caller
/// starts a fresh attempt.
pub struct CredentialCache {
    state: Arc<Mutex<CacheState>>,
}

impl CredentialCache {
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                cached: initial,
                in_flight: None,
            })),
        }
    }

    pub fn current(&self) -> Option<Credential> {
        lock(&self.state).cached.clone()
    }

    /// Independent copy holding the current credential and its own refresh slot.
    pub fn snapshot(&self) -> Self {
        Self::new(self.current())
    }

    pub async fn get_or_refresh<F, Fut>(
        &self,
        now: DateTime<Utc>,
        margin: Duration,
        refresh: F,
    ) -> Result<Credential>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Credential>> + Send + 'static,
    {
        let mut refresh = Some(refresh);

        loop {
            let mut receiver = {
                let mut state = lock(&self.state);

                if let Some(credential) = &state.cached {
                    if !credential.needs_refresh(now, margin) {
                        return Ok(credential.clone());
                    }
                }

                match &state.in_flight {
                    // A closed channel means the refresh task died without reporting.
                    Some(receiver) if receiver.has_changed().is_ok() => receiver.clone(),
                    _ => {
                        let refresh = refresh.take().ok_or_else(|| {
                            KubeError::CredentialRefreshFailure(Box::new(
                                KubeError::InvalidAuthConfiguration(
                                    "credential refresh ended without a result".to_string(),
                                ),
                            ))
                        })?;
                        let receiver = self.start_refresh(refresh());
                        state.in_flight = Some(receiver.clone());
                        receiver
                    }
                }
            };

            let outcome = match receiver.wait_for(Option::is_some).await {
                Ok(outcome) => outcome.clone(),
                Err(_) => continue,
            };
            if let Some(result) = outcome {
                return result;
            }
        }
    }

    fn start_refresh<Fut>(&self, refresh: Fut) -> watch::Receiver<RefreshOutcome>
    where
        Fut: Future<Output = Result<Credential>> + Send + 'static,
    {
        let (sender, receiver) = watch::channel(None);
        let state = Arc::clone(&self.state);

        // Runs detached so a caller giving up does not abort the refresh for
        // everyone else; the command runner bounds how long it can take.
        tokio::spawn(async move {
            let result = refresh.await;
            {
                let mut state = lock(&state);
                if let Ok(credential) = &result {
                    state.cached = Some(credential.clone());
                }
                state.in_flight = None;
            }
            let _ = sender.send(Some(result));
        });

        receiver
    }
}

impl Clone for CredentialCache {
    fn clone(&self) -> Self {
        self.snapshot()
    }
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
