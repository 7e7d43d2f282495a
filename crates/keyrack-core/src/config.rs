//! Library import configuration.
//!
//! A `keyrack.toml` lists the test libraries to import and their arguments:
//!
//! ```toml
//! [[libraries]]
//! name = "ParameterLibrary"
//! args = ["my_host", "8080"]
//!
//! [[libraries]]
//! name = "classes.NameLibrary"
//! enabled = false
//! ```
//!
//! # Resolution Algorithm
//!
//! 1. `KEYRACK_CONFIG_PATH` environment variable
//! 2. Current directory
//! 3. Parent directories (walk up to filesystem root)
//! 4. XDG config directory (`~/.config/keyrack/`)

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// File name looked up in directories.
pub const CONFIG_FILE_NAME: &str = "keyrack.toml";

/// Environment variable overriding config resolution.
pub const CONFIG_PATH_ENV: &str = "KEYRACK_CONFIG_PATH";

/// Errors that can occur during configuration resolution or loading.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error when a config file is malformed.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file not found.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// Libraries to import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,
}

/// One `[[libraries]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Simple or dotted library name.
    pub name: String,

    /// Positional library arguments.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl LibraryConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Config {
    /// Loads and parses a config file from the given path.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - The file does not exist (`NotFound` variant)
    /// - The file exists but cannot be read (`Io` variant)
    /// - The file cannot be parsed as TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(err),
        })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Creates a config without libraries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use = "iterator should be consumed to access enabled libraries"]
    pub fn enabled_libraries(&self) -> impl Iterator<Item = &LibraryConfig> {
        self.libraries.iter().filter(|library| library.enabled)
    }
}

/// A config together with the file it was read from.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    config: Config,
}

impl ConfigFile {
    /// Resolves the config file using the resolution algorithm.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ConfigFile))` if a config file was found and loaded
    /// - `Ok(None)` if no config file was found (missing files are not
    ///   errors)
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - The current directory cannot be determined
    /// - A found config file cannot be read
    /// - A found config file cannot be parsed
    pub fn resolve() -> Result<Option<Self>, ConfigError> {
        // Step 1: Environment variable override
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
            && path.exists()
        {
            return Self::load(path).map(Some);
        }

        // Steps 2 and 3: current directory and its parents
        let current = std::env::current_dir()?;
        if let Some(file) = Self::search(&current)? {
            return Ok(Some(file));
        }

        // Step 4: XDG config directory
        if let Some(path) = xdg_config_path()
            && path.exists()
        {
            return Self::load(path).map(Some);
        }

        Ok(None)
    }

    /// Looks for `keyrack.toml` in `start` and then in each of its parents.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if the first file found cannot be read or
    /// parsed.
    pub fn search(start: &Path) -> Result<Option<Self>, ConfigError> {
        for dir in start.ancestors() {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                return Self::load(path).map(Some);
            }
        }
        Ok(None)
    }

    /// Loads a config file from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if the file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = fs::read_to_string(&path)?;
        let config = toml::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }
}

fn xdg_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("keyrack").join(CONFIG_FILE_NAME))
}
