//! # Moe FM configuration
//!
//! This crate provides configuration management for the Moe FM media server, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Dotted-key access used by the `settings` command line
//! - Type-safe getters and setters for configuration values
//!
//! ## Usage
//!
//! ```no_run
//! use moeconfig::get_config;
//!
//! let config = get_config();
//!
//! let port = config.get_http_port();
//! let level = config.get_log_min_level()?;
//!
//! config.set_path("moefm.tracks_per_request", serde_yaml::Value::from(50))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    net::UdpSocket,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("moefm.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load Moe FM configuration"));
}

const ENV_CONFIG_DIR: &str = "MOEFM_CONFIG";
const ENV_PREFIX: &str = "MOEFM_CONFIG__";
const CONFIG_DIR_NAME: &str = ".moefm";

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ANSI: bool = true;

/// Generates a getter/setter pair for a usize value with a default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            self.get_usize($path, $default)
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Generates a getter/setter pair for a bool value with a default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager
///
/// Holds the merged YAML tree behind a mutex and writes it back to
/// `<config_dir>/config.yaml` on every change.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Write then read probe
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `MOEFM_CONFIG` environment variable
    /// 3. `.moefm` in the current directory
    /// 4. `.moefm` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// The embedded defaults are merged with `config.yaml` when present, then
    /// environment overrides are applied and the result is written back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // An empty file parses as Null, which would wipe the defaults
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        if !external_value.is_null() {
            merge_yaml(&mut default_value, &external_value);
        }
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Returns the directory holding `config.yaml`
    pub fn dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// Intermediate mappings are created as needed.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Removes the value at the specified path and saves
    ///
    /// Returns `false` when nothing was stored there.
    pub fn delete_value(&self, path: &[&str]) -> Result<bool> {
        let mut data = self.data.lock().unwrap();
        let removed = Self::delete_value_internal(&mut data, path);
        drop(data);

        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    fn delete_value_internal(data: &mut Value, path: &[&str]) -> bool {
        let Value::Mapping(map) = data else {
            return false;
        };
        match path {
            [] => false,
            [last] => map.remove(Value::String(last.to_lowercase())).is_some(),
            [first, rest @ ..] => match map.get_mut(Value::String(first.to_lowercase())) {
                Some(next) => Self::delete_value_internal(next, rest),
                None => false,
            },
        }
    }

    /// Gets a value addressed by a dotted key (e.g. `"moefm.tracks_per_request"`)
    pub fn get_path(&self, key: &str) -> Result<Value> {
        self.get_value(&split_key(key))
    }

    /// Sets a value addressed by a dotted key
    pub fn set_path(&self, key: &str, value: Value) -> Result<()> {
        self.set_value(&split_key(key), value)
    }

    /// Deletes a value addressed by a dotted key
    pub fn delete_path(&self, key: &str) -> Result<bool> {
        self.delete_value(&split_key(key))
    }

    /// Returns a copy of the whole configuration tree
    pub fn snapshot(&self) -> Value {
        self.data.lock().unwrap().clone()
    }

    /// Reads a non-negative integer, falling back to `default` when unset or invalid
    pub fn get_usize(&self, path: &[&str], default: usize) -> Result<usize> {
        match self.get_value(path) {
            Ok(Value::Number(n)) => Ok(n.as_u64().map(|v| v as usize).unwrap_or(default)),
            Ok(Value::String(s)) => Ok(s.trim().parse().unwrap_or(default)),
            _ => Ok(default),
        }
    }

    /// Reads a string, `None` when unset or empty
    pub fn get_string(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(Some(s)),
            Ok(Value::Number(n)) => Ok(Some(n.to_string())),
            _ => Ok(None),
        }
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the base URL for the HTTP server
    ///
    /// Returns the configured base URL, or `http://<local ip>:<port>` when unset.
    pub fn get_base_url(&self) -> String {
        match self.get_value(&["host", "base_url"]) {
            Ok(Value::String(s)) if !s.is_empty() => s.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", guess_local_ip(), self.get_http_port()),
        }
    }

    /// Gets the HTTP port from configuration
    ///
    /// Returns the default port (8080) if not configured or invalid.
    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => port,
                None => {
                    tracing::warn!("Invalid HTTP port '{}', using default {}", n, DEFAULT_HTTP_PORT);
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(Value::String(s)) => s.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Invalid HTTP port '{}', using default {}", s, DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }),
            Ok(_) => DEFAULT_HTTP_PORT,
            Err(err) => {
                tracing::warn!(
                    "Failed to get HTTP port: {}, using default {}",
                    err,
                    DEFAULT_HTTP_PORT
                );
                DEFAULT_HTTP_PORT
            }
        }
    }

    /// Sets the HTTP port in configuration
    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    impl_bool_config!(
        get_log_ansi,
        set_log_ansi,
        &["host", "logger", "ansi"],
        DEFAULT_LOG_ANSI
    );

    impl_usize_config!(
        get_shutdown_grace_secs,
        set_shutdown_grace_secs,
        &["host", "shutdown_grace_secs"],
        5
    );

    /// Minimum log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`)
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// The configuration is lazily loaded on first access.
///
/// # Panics
///
/// Panics if no usable configuration directory can be found or created.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn split_key(key: &str) -> Vec<&str> {
    key.split('.').filter(|part| !part.is_empty()).collect()
}

/// Best-effort local LAN address, loopback when unroutable
fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults_are_embedded() {
        let (_dir, config) = temp_config();
        assert_eq!(config.get_http_port(), 8080);
        assert_eq!(
            config.get_usize(&["moefm", "min_tracks_in_playlist"], 0).unwrap(),
            120
        );
        assert_eq!(
            config.get_usize(&["moefm", "tracks_per_request"], 0).unwrap(),
            30
        );
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
    }

    #[test]
    fn test_load_writes_config_file() {
        let (dir, _config) = temp_config();
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_external_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "moefm:\n  Tracks_Per_Request: 10\n",
        )
        .unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(
            config.get_usize(&["moefm", "tracks_per_request"], 0).unwrap(),
            10
        );
        // Untouched keys keep their default
        assert_eq!(
            config.get_usize(&["moefm", "min_tracks_in_playlist"], 0).unwrap(),
            120
        );
    }

    #[test]
    fn test_dotted_paths() {
        let (dir, config) = temp_config();
        config
            .set_path("moefm.oauth_tokens.oauth_token", Value::from("abc"))
            .unwrap();
        assert_eq!(
            config.get_string(&["moefm", "oauth_tokens", "oauth_token"]).unwrap(),
            Some("abc".to_string())
        );

        // Persisted
        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(
            reloaded.get_path("moefm.oauth_tokens.oauth_token").unwrap(),
            Value::from("abc")
        );

        assert!(config.delete_path("moefm.oauth_tokens.oauth_token").unwrap());
        assert!(!config.delete_path("moefm.oauth_tokens.oauth_token").unwrap());
        assert!(config.get_path("moefm.oauth_tokens.oauth_token").is_err());
    }

    #[test]
    fn test_delete_missing_parent_is_noop() {
        let (_dir, config) = temp_config();
        assert!(!config.delete_path("nope.really.missing").unwrap());
        assert!(!config.delete_path("").unwrap());
    }

    #[test]
    fn test_usize_accepts_strings() {
        let (_dir, config) = temp_config();
        config
            .set_value(&["moefm", "tracks_per_request"], Value::from("42"))
            .unwrap();
        assert_eq!(
            config.get_usize(&["moefm", "tracks_per_request"], 0).unwrap(),
            42
        );
        config
            .set_value(&["moefm", "tracks_per_request"], Value::from("many"))
            .unwrap();
        assert_eq!(
            config.get_usize(&["moefm", "tracks_per_request"], 7).unwrap(),
            7
        );
    }

    #[test]
    fn test_generated_accessors() {
        let (_dir, config) = temp_config();
        assert!(config.get_log_ansi().unwrap());
        config.set_log_ansi(false).unwrap();
        assert!(!config.get_log_ansi().unwrap());

        config.set_shutdown_grace_secs(2).unwrap();
        assert_eq!(config.get_shutdown_grace_secs().unwrap(), 2);
    }

    #[test]
    fn test_base_url_prefers_configured_value() {
        let (_dir, config) = temp_config();
        config
            .set_value(&["host", "base_url"], Value::from("http://10.0.0.2:9000/"))
            .unwrap();
        assert_eq!(config.get_base_url(), "http://10.0.0.2:9000");
    }

    #[test]
    fn test_merge_yaml_replaces_scalars() {
        let mut default: Value = serde_yaml::from_str("a:\n  b: 1\n  c: 2\n").unwrap();
        let external: Value = serde_yaml::from_str("a:\n  b: 5\n").unwrap();
        merge_yaml(&mut default, &external);
        assert_eq!(default["a"]["b"], Value::from(5));
        assert_eq!(default["a"]["c"], Value::from(2));
    }
}
