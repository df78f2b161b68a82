// Local configuration: the per-app `config.toml` that lives next to the
// application code, and the per-user global config under the home directory.
//
// On disk the app config keeps variant names and ids as two parallel arrays.
// In memory they are a single ordered list of entries, so the two can never
// drift apart while the program runs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the per-app config inside the app folder.
pub const APP_CONFIG_FILE: &str = "config.toml";
/// Host used when the app config has no `backend_host`.
pub const DEFAULT_HOST: &str = "http://localhost";
/// Directory under `$HOME` holding the global config.
pub const GLOBAL_CONFIG_DIR: &str = ".appctl";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine the home directory")]
    NoHomeDir,
}

/// One variant the app folder knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantEntry {
    pub name: String,
    pub id: String,
}

/// On-disk shape of the app config.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct RawAppConfig {
    app_name: String,
    app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend_host: Option<String>,
    #[serde(default)]
    variants: Vec<String>,
    #[serde(default)]
    variant_ids: Vec<String>,
    /// Keys written by other tools are kept as-is.
    #[serde(flatten)]
    extra: toml::Table,
}

/// Per-application configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawAppConfig", into = "RawAppConfig")]
pub struct AppConfig {
    pub app_name: String,
    pub app_id: String,
    api_key: Option<String>,
    backend_host: Option<String>,
    variants: Vec<VariantEntry>,
    extra: toml::Table,
}

impl TryFrom<RawAppConfig> for AppConfig {
    type Error = String;

    fn try_from(raw: RawAppConfig) -> std::result::Result<Self, Self::Error> {
        if raw.variants.len() != raw.variant_ids.len() {
            return Err(format!(
                "`variants` has {} entries but `variant_ids` has {}",
                raw.variants.len(),
                raw.variant_ids.len()
            ));
        }
        let variants = raw
            .variants
            .into_iter()
            .zip(raw.variant_ids)
            .map(|(name, id)| VariantEntry { name, id })
            .collect();
        Ok(AppConfig {
            app_name: raw.app_name,
            app_id: raw.app_id,
            api_key: raw.api_key,
            backend_host: raw.backend_host,
            variants,
            extra: raw.extra,
        })
    }
}

impl From<AppConfig> for RawAppConfig {
    fn from(config: AppConfig) -> Self {
        let (variants, variant_ids) = config
            .variants
            .into_iter()
            .map(|entry| (entry.name, entry.id))
            .unzip();
        RawAppConfig {
            app_name: config.app_name,
            app_id: config.app_id,
            api_key: config.api_key,
            backend_host: config.backend_host,
            variants,
            variant_ids,
            extra: config.extra,
        }
    }
}

impl AppConfig {
    pub fn new(app_name: impl Into<String>, app_id: impl Into<String>) -> Self {
        AppConfig {
            app_name: app_name.into(),
            app_id: app_id.into(),
            api_key: None,
            backend_host: None,
            variants: Vec::new(),
            extra: toml::Table::new(),
        }
    }

    /// Location of the config file for an app folder.
    pub fn path_in(app_folder: &Path) -> PathBuf {
        app_folder.join(APP_CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the whole config back, replacing the file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string(self)?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Backend host, falling back to the local default.
    pub fn host(&self) -> &str {
        self.backend_host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// API key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn variants(&self) -> &[VariantEntry] {
        &self.variants
    }

    pub fn variant_names(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.name.clone()).collect()
    }

    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn variant_id(&self, name: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.id.as_str())
    }

    pub fn contains_variant_id(&self, id: &str) -> bool {
        self.variants.iter().any(|v| v.id == id)
    }

    /// Records a variant. An existing entry with the same name keeps its
    /// position and gets the new id.
    pub fn upsert_variant(&mut self, name: impl Into<String>, id: impl Into<String>) {
        let name = name.into();
        let id = id.into();
        match self.variants.iter_mut().find(|v| v.name == name) {
            Some(entry) => entry.id = id,
            None => self.variants.push(VariantEntry { name, id }),
        }
    }

    /// Replaces the known variants wholesale, keeping the given order.
    pub fn replace_variants<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = VariantEntry>,
    {
        self.variants = entries.into_iter().collect();
    }
}

/// Per-user settings shared by every app folder.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub telemetry_tracking_enabled: bool,
}

impl GlobalConfig {
    /// `~/.appctl/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(GLOBAL_CONFIG_DIR).join(APP_CONFIG_FILE))
    }

    /// Loads the global config; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No global config at {}, using defaults", path.display());
            return Ok(GlobalConfig::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}
