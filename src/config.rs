//! JSON configuration. Every section is optional and falls back to defaults.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    census::CensusConfig,
    choropleth::ChoroplethConfig,
    clean::CleanerConfig,
    error::{Error, Result},
    promote::PromoteConfig,
    registry::RegistryConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cleaner: CleanerConfig,
    pub promote: PromoteConfig,
    pub choropleth: ChoroplethConfig,
    pub census: CensusConfig,
    pub registry: RegistryConfig,
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid configuration: {e}")))
    }

    /// Load a JSON file. Relative registry base URLs resolve against the
    /// file's directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid configuration in {}: {e}", path.display())))?;

        let base = config.registry.base_url.clone().unwrap_or_else(|| ".".to_string());
        let is_url = url::Url::parse(&base).is_ok_and(|u| u.scheme().len() > 1);
        if !is_url && Path::new(&base).is_relative() {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            config.registry.base_url = Some(dir.join(&base).display().to_string());
        }
        log::debug!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
