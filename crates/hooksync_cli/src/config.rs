//! Configuration file support for hooksync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags (and the environment variables they read, e.g. `GITHUB_ACCESS_TOKEN`)
//! 2. Environment variables prefixed with `HOOKSYNC_`, sections separated by
//!    `__`, e.g. `HOOKSYNC_GITHUB__ORGANIZATION`
//! 3. Config file (./hooksync.toml, then ~/.config/hooksync/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use GITHUB_ACCESS_TOKEN
//! base_url = "https://github.example.com/api/v3/"
//! organization = "acme"
//!
//! [openshift]
//! server = "https://master.example.com:8443"
//! token = "..."  # or use OPENSHIFT_TOKEN
//! public_url = "https://openshift.example.com"
//!
//! [sync]
//! resync_period = "1h"
//! dry_run = false
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub openshift: OpenShiftConfig,
    pub sync: SyncConfig,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    /// API root; github.com when unset.
    pub base_url: Option<String>,
    pub insecure_skip_tls_verify: bool,
    pub organization: Option<String>,
}

/// OpenShift configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenShiftConfig {
    pub server: Option<String>,
    pub token: Option<String>,
    pub insecure_skip_tls_verify: bool,
    /// Discovered from the server when unset.
    pub public_url: Option<String>,
}

/// Defaults for `hooksync sync`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Duration such as `30m` or `1h`; `0` disables resyncs.
    pub resync_period: Option<String>,
    pub dry_run: bool,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/hooksync/config.toml)
    /// 3. Local config file (./hooksync.toml)
    /// 4. Environment variables with HOOKSYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("hooksync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./hooksync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., HOOKSYNC_OPENSHIFT__PUBLIC_URL -> openshift.public_url
        builder = builder.add_source(environment());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Path of the per-user config file.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hooksync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Configured resync period, if it is set and valid.
    pub fn resync_period(&self) -> Option<Duration> {
        let raw = self.sync.resync_period.as_deref()?;
        match humantime::parse_duration(raw) {
            Ok(period) => Some(period),
            Err(e) => {
                tracing::warn!(resync_period = raw, error = %e, "Ignoring invalid resync period in config");
                None
            }
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("HOOKSYNC")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
