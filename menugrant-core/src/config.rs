#![forbid(unsafe_code)]

use crate::error::Error;
use crate::serializer::{AssignmentSerializer, HydrationPolicy, PayloadMode};
use crate::tree::TreeLimits;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_filename: String,
    pub catalog_path: Option<PathBuf>,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub payload_mode: PayloadMode,
    pub hydration: HydrationPolicy,
    pub max_depth: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_else(|_| {
                let fallback = std::env::temp_dir().join("menugrant");
                tracing::warn!(
                    path = %fallback.display(),
                    "Could not determine platform data directory; using ephemeral temp directory"
                );
                fallback
            }),
            db_filename: "menugrant.db".to_string(),
            catalog_path: None,
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payload_mode: PayloadMode::default(),
            hydration: HydrationPolicy::default(),
            max_depth: None,
        }
    }
}

impl EngineConfig {
    pub fn serializer(&self) -> AssignmentSerializer {
        AssignmentSerializer::new()
            .with_payload_mode(self.payload_mode)
            .with_hydration(self.hydration)
    }

    pub fn limits(&self) -> TreeLimits {
        TreeLimits {
            max_depth: self.max_depth,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            data_dir: default_data_dir()?,
            db_filename: "menugrant.db".to_string(),
            catalog_path: None,
            engine: EngineConfig::default(),
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(yaml)?;
        if config.engine.max_depth == Some(0) {
            return Err(Error::Config("engine.max_depth must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_filename)
    }

    pub fn with_data_dir(mut self, path: PathBuf) -> Self {
        self.data_dir = path;
        self
    }

    pub fn with_catalog(mut self, path: PathBuf) -> Self {
        self.catalog_path = Some(path);
        self
    }

    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

fn default_data_dir() -> Result<PathBuf, Error> {
    ProjectDirs::from("io", "menugrant", "menugrant")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::Config(
                "Could not determine platform data directory; \
                 please specify --data-dir or set $HOME"
                    .to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_filename, "menugrant.db");
        assert_eq!(config.engine.payload_mode, PayloadMode::Full);
        assert_eq!(config.engine.hydration, HydrationPolicy::Trust);
        assert_eq!(config.engine.max_depth, None);
    }

    #[test]
    fn test_db_path() {
        let config = Config::default().with_data_dir(PathBuf::from("/tmp/test"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/test/menugrant.db"));
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            "data_dir: /srv/menugrant\nengine:\n  hydration: heal\n  payload_mode: leaves_only\n",
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/menugrant"));
        assert_eq!(config.db_filename, "menugrant.db");
        assert_eq!(config.engine.hydration, HydrationPolicy::Heal);
        assert_eq!(config.engine.payload_mode, PayloadMode::LeavesOnly);
        assert_eq!(config.engine.max_depth, None);
        assert_eq!(config.engine.serializer().hydration(), HydrationPolicy::Heal);
    }

    #[test]
    fn test_max_depth_opt_in() {
        let config = Config::from_yaml("engine:\n  max_depth: 8\n").unwrap();
        assert_eq!(config.engine.limits().max_depth, Some(8));
        assert_eq!(Config::default().engine.limits(), TreeLimits::default());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let result = Config::from_yaml("engine:\n  max_depth: 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
