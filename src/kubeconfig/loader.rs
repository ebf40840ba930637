// src/kubeconfig/loader.rs
use super::model::KubeConfig;
use crate::error::{KubeError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Location kubectl uses by default: `$HOME/.kube/config`.
pub fn locate() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

impl KubeConfig {
    pub fn load() -> Result<Self> {
        let path = locate().ok_or_else(|| {
            KubeError::config_load("~/.kube/config", "cannot determine the home directory")
        })?;
        Self::load_from_file(path)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = path.as_ref().to_string_lossy().to_string();
        let expanded = PathBuf::from(shellexpand::tilde(&raw).to_string());

        let content = fs::read_to_string(&expanded).map_err(|e| KubeError::config_load(&raw, e))?;
        let mut config = Self::parse(&content, &raw)?;
        config.source_dir = expanded.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| KubeError::config_load(origin, e))
    }
}
