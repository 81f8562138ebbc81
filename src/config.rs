//! Configuration Management
//!
//! Handles persistent configuration storage for trellis.

use crate::query::PageLimits;
use crate::server::ControllerConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_PAGE_SIZE: usize = 25;
const MAX_PAGE_SIZE: usize = 100;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn max_page_size() -> usize {
    MAX_PAGE_SIZE
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Graph file used when none is given on the command line
    #[serde(default)]
    pub graph: Option<PathBuf>,
    /// Server the `fetch` command talks to
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "max_page_size")]
    pub max_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph: None,
            base_url: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("trellis").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Get effective graph file (CLI > config > embedded sample)
    pub fn effective_graph(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf).or_else(|| self.graph.clone())
    }

    /// Get effective base URL (CLI > config)
    pub fn effective_base_url(&self, cli: Option<&str>) -> Option<String> {
        cli.map(String::from).or_else(|| self.base_url.clone())
    }

    /// Paging limits; a ceiling below the default is raised to it
    pub fn page_limits(&self) -> PageLimits {
        let default = self.default_page_size.max(1);
        PageLimits {
            default,
            max: self.max_page_size.max(default),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            page: self.page_limits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"base_url": "http://localhost:3000"}"#).unwrap();
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            base_url: Some("http://configured".into()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_base_url(Some("http://flag")).as_deref(),
            Some("http://flag")
        );
        assert_eq!(config.effective_base_url(None).as_deref(), Some("http://configured"));
        assert_eq!(config.effective_graph(None), None);
    }

    #[test]
    fn test_page_limits_stay_consistent() {
        let config = Config {
            default_page_size: 50,
            max_page_size: 10,
            ..Config::default()
        };
        assert_eq!(config.page_limits(), PageLimits { default: 50, max: 50 });
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("trellis-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let config = Config {
            graph: Some(PathBuf::from("graph.yaml")),
            default_page_size: 10,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
