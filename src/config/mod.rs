//! Persisted settings for pumpctl.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `PUMPCTL_CONFIG` environment variable (explicit path)
//! 2. `./pumpctl.toml` (current directory)
//! 3. The platform config directory, via `directories`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `PUMPCTL_SAMPLING_INTERVAL_MS`
//! - `PUMPCTL_ENCODING`
//! - `PUMPCTL_LOG_LEVEL`
//! - `PUMPCTL_PORT`
//!
//! # Example
//!
//! ```rust,no_run
//! use pumpctl::config::ConfigLoader;
//! use pumpctl::protocol::PumpId;
//!
//! let mut loader = ConfigLoader::load_or_default();
//! loader.config_mut().set_setpoint(PumpId::HiPump1, "3.2");
//! loader.save()?;
//! # Ok::<(), pumpctl::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, WindowConfig, KEYS};
