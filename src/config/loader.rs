//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "PUMPCTL";

/// Config file name
const CONFIG_FILE_NAME: &str = "pumpctl.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "PUMPCTL_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Where the configuration is read from and saved to (if anywhere)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `PUMPCTL_CONFIG` environment variable (explicit path)
    /// 2. `./pumpctl.toml` (current directory)
    /// 3. The platform config directory (`~/.config/pumpctl/pumpctl.toml`,
    ///    `%APPDATA%\pumpctl\config\pumpctl.toml`, ...)
    /// 4. Built-in defaults (no file required)
    ///
    /// When no file exists yet, the platform location becomes the save target.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path().or_else(get_default_config_path);

        let mut config = match config_path {
            Some(ref path) if path.exists() => load_from_file(path)?,
            _ => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Like [`load`](Self::load), but a missing or corrupt file only costs a
    /// warning: defaults are used and the resolved path is kept for saving.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(loader) => loader,
            Err(e) => {
                warn!(error = %e, "settings unusable, falling back to defaults");
                let mut loader = Self::with_defaults();
                loader.config_path = resolve_config_path().or_else(get_default_config_path);
                loader
            }
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if let Err(e) = apply_env_overrides(&mut config) {
            warn!(error = %e, "ignoring environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Restore defaults and persist them.
    pub fn reset(&mut self) -> ConfigResult<()> {
        self.config = Config::default();
        self.save()
    }
}

/// Resolve an existing configuration file using standard locations.
///
/// An explicit `PUMPCTL_CONFIG` path is returned even if the file does not
/// exist yet, so it can be created on save.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(path = %path.display(), "loading settings");
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(path = %path.display(), "settings saved");
    Ok(())
}

/// Apply environment variable overrides to the configuration.
///
/// - `PUMPCTL_SAMPLING_INTERVAL_MS=500`
/// - `PUMPCTL_ENCODING=gbk`
/// - `PUMPCTL_LOG_LEVEL=debug`
/// - `PUMPCTL_PORT=/dev/ttyUSB0`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let var = |key: &str| format!("{}_{}", ENV_PREFIX, key);

    if let Ok(val) = std::env::var(var("SAMPLING_INTERVAL_MS")) {
        config.sampling_interval_ms = val
            .trim()
            .parse()
            .map_err(|_| ConfigError::env_parse(var("SAMPLING_INTERVAL_MS"), "Invalid interval"))?;
    }
    if let Ok(val) = std::env::var(var("ENCODING")) {
        config.encoding = val
            .parse()
            .map_err(|e| ConfigError::env_parse(var("ENCODING"), format!("{e}")))?;
    }
    if let Ok(val) = std::env::var(var("LOG_LEVEL")) {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var(var("PORT")) {
        config.serial.port = Some(val);
    }

    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pumpctl").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
