use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::render::RasterOptions;
use crate::settings::PageSetup;
use crate::throttle::ThrottlePolicy;

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse engine config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize engine config {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write engine config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub throttle: ThrottlePolicy,
    #[serde(default)]
    pub page_setup: PageSetup,
    #[serde(default)]
    pub raster: RasterOptions,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            throttle: ThrottlePolicy::default(),
            page_setup: PageSetup::default(),
            raster: RasterOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config: EngineConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.sanitize();
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut config = self.clone();
        config.sanitize();
        let text =
            serde_json::to_string_pretty(&config).map_err(|source| ConfigError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        self.throttle.sanitize();
        self.page_setup.sanitize();
        self.raster.dpi = self.raster.dpi.clamp(18, 1200);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Orientation, PaperId};
    use crate::settings::MAX_PAPER_EDGE_MM;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = EngineConfig::load(dir.path().join("absent.json")).expect("load");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("engine.json");
        let mut config = EngineConfig::default();
        config.throttle.threshold = 5;
        config.page_setup.orientation = Orientation::Landscape;
        config.raster.dpi = 150;
        config.save(&path).expect("save");

        let loaded = EngineConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_is_filled_and_sanitized() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(
            &path,
            r#"{
                "version": 0,
                "throttle": { "threshold": 0, "base_cooldown_secs": 10, "max_cooldown_secs": 1 },
                "page_setup": { "paper": { "id": "letter", "width_mm": 215.9, "height_mm": 279.4 } },
                "raster": { "dpi": 5 }
            }"#,
        )
        .expect("write");

        let config = EngineConfig::load(&path).expect("load");
        assert_eq!(config.version, 1);
        assert_eq!(config.throttle.threshold, 1);
        assert_eq!(config.throttle.max_cooldown_secs, 10);
        assert_eq!(config.page_setup.paper.id, PaperId::Letter);
        assert_eq!(config.page_setup.printable_inset_pt, 18.0);
        assert_eq!(config.raster.dpi, 18);
    }

    #[test]
    fn oversized_custom_paper_is_capped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(
            &path,
            r#"{
                "page_setup": { "paper": { "id": "custom", "width_mm": 1e9, "height_mm": 300.0 } },
                "raster": { "dpi": 1200 }
            }"#,
        )
        .expect("write");

        let config = EngineConfig::load(&path).expect("load");
        assert_eq!(config.page_setup.paper.width_mm, MAX_PAPER_EDGE_MM);
        assert_eq!(config.page_setup.paper.height_mm, 300.0);
        assert_eq!(config.raster.dpi, 1200);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(&path, "{ not json").expect("write");
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("engine.json"));
    }
}
