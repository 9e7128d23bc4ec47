//! `flowcheck.toml` configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::Level;
use crate::error::LoadError;

pub const DEFAULT_CONFIG_FILE: &str = "flowcheck.toml";
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Ontology file (YAML or JSON).
    pub ontology: Option<PathBuf>,
    /// Schema bundle files or directories.
    pub schemas: Vec<PathBuf>,
    pub level: Level,
    /// Upper bound for reading any single input file.
    pub load_timeout_ms: u64,
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Capabilities treated as checkpoint providers in addition to the ones
    /// flagged `provides_checkpoint` in the ontology.
    pub checkpoint_capabilities: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            ontology: None,
            schemas: Vec::new(),
            level: Level::default(),
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            safety: SafetyConfig::default(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        SafetyConfig {
            checkpoint_capabilities: vec!["checkpoint".to_string()],
        }
    }
}

impl ValidatorConfig {
    /// Load configuration. An explicit path must exist; without one,
    /// `flowcheck.toml` in the working directory is used if present and the
    /// defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(ValidatorConfig::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&config_path).map_err(|source| LoadError::Io {
            path: config_path.clone(),
            source,
        })?;
        let mut config: ValidatorConfig =
            toml::from_str(&contents).map_err(|e| LoadError::Config {
                path: config_path.clone(),
                reason: e.to_string(),
            })?;
        if let Some(base) = config_path.parent() {
            config.rebase(base);
        }
        tracing::debug!(path = %config_path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve relative input paths against the directory of the file that
    /// named them.
    fn rebase(&mut self, base: &Path) {
        let resolve = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.ontology = self.ontology.as_deref().map(&resolve);
        self.schemas = self.schemas.iter().map(|p| resolve(p)).collect();
    }

    pub fn load_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.load_timeout_ms)
    }
}
