//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/fern/fern.toml`
//! 3. Local config: an explicit file passed to [`Settings::load`]
//! 4. Environment variables: `FERN_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{FernError, FernResult};

pub const ENV_PREFIX: &str = "FERN";

/// Effective arena settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Number of allocatable fronds
    pub capacity: usize,
    /// Run the invariant checker after every release
    pub verify_on_release: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            verify_on_release: false,
        }
    }
}

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub capacity: Option<usize>,
    pub verify_on_release: Option<bool>,
}

/// Get the XDG config directory for fern.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fern").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("fern.toml"))
}

fn load_raw_settings(path: &Path) -> FernResult<RawSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| FernError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| FernError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            capacity: overlay.capacity.unwrap_or(self.capacity),
            verify_on_release: overlay.verify_on_release.unwrap_or(self.verify_on_release),
        }
    }

    /// Load settings: defaults, then global file, then `local` (if it
    /// exists), then `FERN_*` environment variables.
    #[instrument(level = "debug")]
    pub fn load(local: Option<&Path>) -> FernResult<Self> {
        Self::load_layered(global_config_path().as_deref(), local, ENV_PREFIX)
    }

    pub(crate) fn load_layered(
        global: Option<&Path>,
        local: Option<&Path>,
        env_prefix: &str,
    ) -> FernResult<Self> {
        let mut current = Self::default();

        for path in [global, local].into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "merging config file");
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            }
        }

        Self::apply_env_overrides(current, env_prefix)
    }

    /// Apply `<prefix>_*` environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self, env_prefix: &str) -> FernResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        match config.get_int("capacity") {
            Ok(val) => {
                settings.capacity = usize::try_from(val).map_err(|_| FernError::Config {
                    message: format!("capacity must not be negative: {val}"),
                })?;
            }
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(config_err(e)),
        }
        match config.get_bool("verify_on_release") {
            Ok(val) => settings.verify_on_release = val,
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(config_err(e)),
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> FernResult<String> {
        toml::to_string_pretty(self).map_err(|e| FernError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# fern configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/fern/fern.toml
#   Local:  file passed to Settings::load
#   Env:    FERN_* environment variables

# Number of allocatable fronds (the arena never grows)
# capacity = 1024

# Check all arena invariants after every release (slow, for debugging)
# verify_on_release = false
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> FernError {
    FernError::Config {
        message: e.to_string(),
    }
}
