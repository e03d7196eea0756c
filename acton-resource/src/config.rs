//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: ACTON_, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/acton-resource/{service_name}/config.toml
//! 4. System directory: /etc/acton-resource/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Default paging for collection endpoints
    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prefix for generated links, e.g. `https://api.example.com`
    #[serde(default)]
    pub base_url: String,
}

/// Paging defaults applied by [`Slicer::from_config`](crate::slicer::Slicer::from_config)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Window size when the request names none; unset means unbounded
    #[serde(default)]
    pub default_limit: Option<u64>,

    /// Largest window a request may ask for
    #[serde(default)]
    pub max_limit: Option<u64>,

    /// Largest offset a request may ask for
    #[serde(default)]
    pub max_offset: Option<u64>,

    /// Query and metadata key for the window size
    #[serde(default = "default_limit_name")]
    pub limit_name: String,

    /// Query and metadata key for the window start
    #[serde(default = "default_offset_name")]
    pub offset_name: String,

    /// Metadata key for the total count
    #[serde(default = "default_count_name")]
    pub count_name: String,

    /// Metadata key for the previous window link
    #[serde(default = "default_prev_name")]
    pub prev_name: String,

    /// Metadata key for the next window link
    #[serde(default = "default_next_name")]
    pub next_name: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: None,
            max_limit: None,
            max_offset: None,
            limit_name: default_limit_name(),
            offset_name: default_offset_name(),
            count_name: default_count_name(),
            prev_name: default_prev_name(),
            next_name: default_next_name(),
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_limit_name() -> String {
    "limit".to_string()
}

fn default_offset_name() -> String {
    "offset".to_string()
}

fn default_count_name() -> String {
    "count".to_string()
}

fn default_prev_name() -> String {
    "prev".to_string()
}

fn default_next_name() -> String {
    "next".to_string()
}

const CONFIG_PREFIX: &str = "acton-resource";

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is taken from the running binary.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| CONFIG_PREFIX.to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::named(service_name)));

        // Lowest priority first so later files override earlier ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("ACTON_").split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the search path; environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ACTON_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Candidate config file paths, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Ok(path) = xdg_dirs.place_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Where the config file for a service should live
    ///
    /// Returns: ~/.config/acton-resource/{service_name}/config.toml
    pub fn recommended_path(service_name: &str) -> PathBuf {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");

        // place_config_file creates parent directories if needed
        xdg_dirs
            .place_config_file(&config_file_path)
            .unwrap_or_else(|_| {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| String::from("~")))
                    .join(".config")
                    .join(CONFIG_PREFIX)
                    .join(service_name)
                    .join("config.toml")
            })
    }

    fn named(service_name: &str) -> Self {
        let mut config = Self::default();
        config.service.name = service_name.to_string();
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: CONFIG_PREFIX.to_string(),
                port: default_port(),
                log_level: default_log_level(),
                base_url: String::new(),
            },
            pagination: PaginationConfig::default(),
        }
    }
}
