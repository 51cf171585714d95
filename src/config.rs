// Tracker configuration loaded from YAML

use crate::item::Category;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE_KEY: &str = "myList";
const APP_DIR: &str = "watchlist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The closed set of item categories, in display order
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Key under which the whole collection is stored
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Seed one example item when the collection is empty
    #[serde(default = "default_true")]
    pub seed_example: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            storage: StorageConfig::default(),
            storage_key: default_storage_key(),
            seed_example: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,
    /// Data directory; falls back to the platform data dir
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
}

fn default_categories() -> Vec<String> {
    vec!["Game".to_string(), "Show".to_string(), "Movie".to_string()]
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load from an explicit path, or from the user config dir when `None`.
    /// A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match dirs::config_dir() {
                Some(dir) => dir.join(APP_DIR).join("config.yml"),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document is valid and means defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(eyre!("At least one category must be configured"));
        }

        let mut seen = HashSet::new();
        for name in &self.categories {
            let name = name.trim();
            if name.is_empty() {
                return Err(eyre!("Category names cannot be empty"));
            }
            if name.eq_ignore_ascii_case("ALL") {
                return Err(eyre!("\"ALL\" is reserved and cannot be a category"));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(eyre!("Duplicate category: {}", name));
            }
        }
        Ok(())
    }

    /// Resolve a category name case-insensitively to its configured spelling
    pub fn category(&self, name: &str) -> Option<Category> {
        let wanted = name.trim().to_lowercase();
        self.categories
            .iter()
            .map(|c| c.trim())
            .find(|c| c.to_lowercase() == wanted)
            .map(Category::new)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.categories.iter().map(|c| Category::new(c.trim())).collect()
    }

    /// Directory holding persisted data
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .ok_or_else(|| eyre!("Unable to resolve user data directory"))
    }
}
