//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "COMPORT";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "COMPORT_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `COMPORT_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. `config.toml` in the platform config directory for `comport`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }

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
        if let Err(err) = apply_env_overrides(&mut config) {
            warn!(error = %err, "Ignoring environment override");
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

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or(ConfigError::NoConfigPath)?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            let mut config = load_from_file(path)?;
            apply_env_overrides(&mut config)?;
            config.validate()?;
            self.config = config;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!(path = %path.display(), "{CONFIG_PATH_ENV} points at a missing file");
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "comport").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(path = %path.display(), "Loaded configuration file");
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply process environment overrides to the configuration.
///
/// Variables follow the pattern `COMPORT_<SECTION>_<KEY>`, for example
/// `COMPORT_SERIAL_DEFAULT_BAUD=115200` or `COMPORT_LOGGING_FORMAT=json`.
/// `TEST_PORT`, `TEST_BAUD` and `LOOPBACK_ENABLED` are accepted for the
/// testing section.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_overrides(config, |var| std::env::var(var).ok())
}

fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let key = |name: &str| format!("{ENV_PREFIX}_{name}");

    // Serial overrides
    if let Some(val) = parse_var(&lookup, &key("SERIAL_DEFAULT_BAUD"))? {
        config.serial.default_baud = val;
    }
    if let Some(val) = parse_var(&lookup, &key("SERIAL_DEFAULT_DATA_BITS"))? {
        config.serial.default_data_bits = val;
    }
    if let Some(val) = parse_var(&lookup, &key("SERIAL_DEFAULT_PARITY"))? {
        config.serial.default_parity = val;
    }
    if let Some(val) = parse_var(&lookup, &key("SERIAL_DEFAULT_STOP_BITS"))? {
        config.serial.default_stop_bits = val;
    }
    if let Some(val) = parse_var(&lookup, &key("SERIAL_READ_TIMEOUT_MS"))? {
        config.serial.read_timeout_ms = val;
    }
    if let Some(val) = parse_var(&lookup, &key("SERIAL_IDLE_TIMEOUT_MS"))? {
        config.serial.idle_timeout_ms = Some(val);
    }
    if let Some(val) = parse_var(&lookup, &key("SERIAL_BREAK_DURATION_MS"))? {
        config.serial.break_duration_ms = val;
    }

    // Logging overrides
    if let Some(val) = lookup(&key("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    if let Some(val) = parse_var(&lookup, &key("LOGGING_FORMAT"))? {
        config.logging.format = val;
    }

    // Testing overrides, with the legacy names as fallback
    if let Some(val) = lookup(&key("TESTING_PORT")).or_else(|| lookup("TEST_PORT")) {
        config.testing.port = Some(val);
    }
    let baud_var = if lookup(&key("TESTING_BAUD")).is_some() {
        key("TESTING_BAUD")
    } else {
        "TEST_BAUD".to_string()
    };
    if let Some(val) = parse_var(&lookup, &baud_var)? {
        config.testing.baud = val;
    }
    if let Some(val) =
        lookup(&key("TESTING_LOOPBACK_ENABLED")).or_else(|| lookup("LOOPBACK_ENABLED"))
    {
        config.testing.loopback_enabled = val.eq_ignore_ascii_case("true") || val == "1";
    }

    Ok(())
}

fn parse_var<F, T>(lookup: &F, var: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: ToString,
{
    lookup(var)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|err: T::Err| ConfigError::BadOverride {
                    var: var.to_string(),
                    reason: err.to_string(),
                    value: raw,
                })
        })
        .transpose()
}
