//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::auth::DEFAULT_OPERATOR;
use crate::core::store::StoreBackend;
use crate::onboarding::committer::{ImportDefaults, DEFAULT_IMPORT_ACTOR};
use crate::onboarding::preview::DEFAULT_PAGE_SIZE;

/// Fleet configuration with layered hierarchy
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Name the session acts as
    pub operator: Option<String>,

    /// Recorded as `lastMovement.by` on imported vehicles
    pub import_actor: Option<String>,

    /// Storage backend for the local API
    pub store: Option<StoreBackend>,

    /// Directory holding the vehicle store
    pub data_dir: Option<PathBuf>,

    /// Fleet server base URL; when set, the HTTP API is used
    pub api_url: Option<String>,

    /// Bearer token for the fleet server
    pub api_token: Option<String>,

    /// Rows per page in the import preview
    pub page_size: Option<usize>,

    /// Serve sample vehicles and devices from the local API
    pub demo_data: Option<bool>,

    pub default_location: Option<String>,
    pub default_lat: Option<f64>,
    pub default_lng: Option<f64>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (resolved by the accessors below)

        // 2. Global user config (~/.config/fleet/config.yaml or $FLEET_CONFIG)
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(file_config) => config.merge(file_config),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring config file"),
                }
            }
        }

        // 3. Environment variables
        config.merge(Self::from_env());

        config
    }

    /// Read one YAML config file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str::<Config>(&contents).map_err(|e| e.to_string())
    }

    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut config = Config {
            operator: var("FLEET_OPERATOR"),
            data_dir: var("FLEET_DATA_DIR").map(PathBuf::from),
            api_url: var("FLEET_API_URL"),
            api_token: var("FLEET_API_TOKEN"),
            ..Default::default()
        };

        if let Some(store) = var("FLEET_STORE") {
            match store.parse() {
                Ok(backend) => config.store = Some(backend),
                Err(e) => tracing::warn!("FLEET_STORE: {}", e),
            }
        }
        if let Some(demo) = var("FLEET_DEMO_DATA") {
            config.demo_data = Some(matches!(
                demo.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ));
        }

        config
    }

    /// Path of the user config file
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os("FLEET_CONFIG").filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "fleet")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.operator.is_some() {
            self.operator = other.operator;
        }
        if other.import_actor.is_some() {
            self.import_actor = other.import_actor;
        }
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.api_url.is_some() {
            self.api_url = other.api_url;
        }
        if other.api_token.is_some() {
            self.api_token = other.api_token;
        }
        if other.page_size.is_some() {
            self.page_size = other.page_size;
        }
        if other.demo_data.is_some() {
            self.demo_data = other.demo_data;
        }
        if other.default_location.is_some() {
            self.default_location = other.default_location;
        }
        if other.default_lat.is_some() {
            self.default_lat = other.default_lat;
        }
        if other.default_lng.is_some() {
            self.default_lng = other.default_lng;
        }
    }

    /// Get the operator name, falling back to the login name
    pub fn operator(&self) -> String {
        if let Some(ref operator) = self.operator {
            return operator.clone();
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| DEFAULT_OPERATOR.to_string())
    }

    pub fn import_actor(&self) -> String {
        self.import_actor
            .clone()
            .unwrap_or_else(|| DEFAULT_IMPORT_ACTOR.to_string())
    }

    pub fn store(&self) -> StoreBackend {
        self.store.unwrap_or_default()
    }

    /// Data directory, falling back to the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "fleet")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".fleet"))
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn page_size(&self) -> usize {
        self.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn demo_data(&self) -> bool {
        self.demo_data.unwrap_or(true)
    }

    /// Values the committer fills in for missing optional fields
    pub fn import_defaults(&self) -> ImportDefaults {
        let mut defaults = ImportDefaults::default();
        if let Some(ref location) = self.default_location {
            defaults.location = location.clone();
        }
        if let Some(lat) = self.default_lat {
            defaults.lat = lat;
        }
        if let Some(lng) = self.default_lng {
            defaults.lng = lng;
        }
        defaults
    }
}
