use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
#[cfg(feature = "config")]
use std::fs;
#[cfg(feature = "config")]
use std::path::Path;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base directory of the file system loader
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Keep compiled templates loaded by name
    #[serde(default)]
    pub cache_enabled: bool,

    /// Nesting limit for includes evaluated at render time
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,

    /// Appended by `compile_file` to names without an extension (e.g. "html")
    #[serde(default)]
    pub extension: String,
}

fn default_directory() -> String {
    "templates".to_string()
}
fn default_max_include_depth() -> usize {
    32
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            cache_enabled: false,
            max_include_depth: default_max_include_depth(),
            extension: String::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    ///
    /// Settings may sit at the top level or under a `[templates]` table.
    #[cfg(feature = "config")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let content = fs::read_to_string(path_ref).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path_ref.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| {
            e.with_context(format!("Invalid config file '{}'", path_ref.display()))
        })?;

        log::debug!(
            "Successfully loaded template configuration from: {}",
            path_ref.display()
        );
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut value: toml::Table = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {}", e)))?;

        let table = match value.remove("templates") {
            Some(toml::Value::Table(section)) => section,
            Some(_) => return Err(Error::config("'templates' must be a table")),
            None => value,
        };

        let config: EngineConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e| Error::config(format!("Invalid template settings: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration from defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `TESSERA_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(directory) = env::var("TESSERA_DIRECTORY") {
            self.directory = directory;
        }
        if let Ok(cache) = env::var("TESSERA_CACHE") {
            self.cache_enabled = parse_bool(&cache)
                .ok_or_else(|| Error::config("Invalid TESSERA_CACHE value"))?;
        }
        if let Ok(depth) = env::var("TESSERA_MAX_INCLUDE_DEPTH") {
            self.max_include_depth = depth
                .parse()
                .map_err(|_| Error::config("Invalid TESSERA_MAX_INCLUDE_DEPTH value"))?;
        }
        if let Ok(extension) = env::var("TESSERA_EXTENSION") {
            self.extension = extension;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_include_depth == 0 {
            return Err(Error::config("max_include_depth must be at least 1"));
        }
        if self.directory.is_empty() {
            return Err(Error::config("Template directory cannot be empty"));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
