// config/types.rs
use crate::error::{KubeError, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
pub const DEFAULT_CREDENTIAL_WAIT_SECS: u64 = 60;
pub const MAX_REFRESH_MARGIN_SECS: u64 = 24 * 60 * 60;

/// Client-side tuning that does not live in the kubeconfig itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Upper bound on a single credential command run.
    pub exec_timeout_secs: u64,
    /// Credentials this close to expiry are treated as already expired.
    pub refresh_margin_secs: u64,
    /// How long a request waits for a credential before giving up.
    pub credential_wait_secs: u64,
    pub default_namespace: String,
    pub log_headers: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            exec_timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            credential_wait_secs: DEFAULT_CREDENTIAL_WAIT_SECS,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            log_headers: false,
        }
    }
}

impl ClientSettings {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let config_str =
            fs::read_to_string(&expanded).map_err(|e| KubeError::config_load(path, e))?;
        let settings: Self =
            serde_json::from_str(&config_str).map_err(|e| KubeError::config_load(path, e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let config_str =
            serde_json::to_string_pretty(self).map_err(|e| KubeError::config_load(path, e))?;
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent).map_err(|e| KubeError::config_load(path, e))?;
        }
        fs::write(path, config_str).map_err(|e| KubeError::config_load(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.exec_timeout_secs == 0 {
            return Err(KubeError::InvalidOptions(
                "exec_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.credential_wait_secs == 0 {
            return Err(KubeError::InvalidOptions(
                "credential_wait_secs must be greater than zero".to_string(),
            ));
        }
        if self.refresh_margin_secs > MAX_REFRESH_MARGIN_SECS {
            return Err(KubeError::InvalidOptions(format!(
                "refresh_margin_secs must be at most {}",
                MAX_REFRESH_MARGIN_SECS
            )));
        }
        if self.default_namespace.trim().is_empty() {
            return Err(KubeError::InvalidOptions(
                "default_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn refresh_margin(&self) -> Result<chrono::Duration> {
        i64::try_from(self.refresh_margin_secs)
            .ok()
            .filter(|secs| *secs as u64 <= MAX_REFRESH_MARGIN_SECS)
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                KubeError::InvalidOptions(format!(
                    "refresh_margin_secs {} is out of range",
                    self.refresh_margin_secs
                ))
            })
    }

    pub fn credential_wait(&self) -> Duration {
        Duration::from_secs(self.credential_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: ClientSettings = serde_json::from_str(r#"{"exec_timeout_secs": 5}"#).unwrap();
        assert_eq!(settings.exec_timeout_secs, 5);
        assert_eq!(settings.refresh_margin_secs, DEFAULT_REFRESH_MARGIN_SECS);
        assert_eq!(settings.default_namespace, "default");
    }

    #[test]
    fn save_then_load_preserves_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        let path = path.to_str().unwrap();

        let settings = ClientSettings {
            refresh_margin_secs: 120,
            log_headers: true,
            ..ClientSettings::default()
        };
        settings.save_to_file(path).unwrap();

        assert_eq!(ClientSettings::load_from_file(path).unwrap(), settings);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let settings = ClientSettings {
            exec_timeout_secs: 0,
            ..ClientSettings::default()
        };
        assert!(matches!(settings.validate(), Err(KubeError::InvalidOptions(_))));
    }

    #[test]
    fn oversized_refresh_margin_is_rejected() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"refresh_margin_secs": 100000000000000000}"#).unwrap();
        assert!(matches!(settings.validate(), Err(KubeError::InvalidOptions(_))));
        assert!(matches!(settings.refresh_margin(), Err(KubeError::InvalidOptions(_))));

        let wrapping = ClientSettings {
            refresh_margin_secs: u64::MAX,
            ..ClientSettings::default()
        };
        assert!(wrapping.validate().is_err());
        assert!(wrapping.refresh_margin().is_err());
    }

    #[test]
    fn largest_allowed_margin_converts() {
        let settings = ClientSettings {
            refresh_margin_secs: MAX_REFRESH_MARGIN_SECS,
            ..ClientSettings::default()
        };
        settings.validate().unwrap();
        assert_eq!(settings.refresh_margin().unwrap(), chrono::Duration::days(1));
    }

    #[test]
    fn unreadable_file_is_a_config_load_failure() {
        let err = ClientSettings::load_from_file("/nonexistent/kube-connect.json").unwrap_err();
        assert!(matches!(err, KubeError::ConfigLoadFailure { .. }));
    }
}
