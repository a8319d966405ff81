use crate::validation::DEFAULT_CACHE_CAPACITY;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = ".media_uploader";
pub const DEFAULT_STORE_FILE: &str = "media_persistence.json";

pub const PATH_ENV: &str = "MEDIA_STORE_PATH";
pub const CACHE_CAPACITY_ENV: &str = "MEDIA_STORE_CACHE_CAPACITY";

/// Persistence service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Backing JSON file
    pub path: PathBuf,

    /// Maximum number of cached validation verdicts
    pub cache_capacity: usize,

    /// Pretty-print the backing file
    pub pretty: bool,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            pretty: true,
        }
    }

    /// Set the validation cache bound
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set pretty printing
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// `$HOME/.media_uploader/media_persistence.json`, falling back to
    /// `USERPROFILE` and then to the current directory.
    pub fn default_path() -> PathBuf {
        let home = ["HOME", "USERPROFILE"]
            .into_iter()
            .filter_map(|var| env::var(var).ok())
            .find(|value| !value.is_empty());

        match home {
            Some(home) => PathBuf::from(home)
                .join(DEFAULT_DATA_DIR)
                .join(DEFAULT_STORE_FILE),
            None => PathBuf::from(DEFAULT_STORE_FILE),
        }
    }

    /// Defaults overridden by `MEDIA_STORE_PATH` and
    /// `MEDIA_STORE_CACHE_CAPACITY`.
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(env::var(PATH_ENV).ok(), env::var(CACHE_CAPACITY_ENV).ok())
    }

    fn from_vars(path: Option<String>, capacity: Option<String>) -> Result<Self, String> {
        let path = path
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::new(path);

        if let Some(raw) = capacity {
            let capacity = raw
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("{} must be a positive integer: {}", CACHE_CAPACITY_ENV, e))?;
            config = config.cache_capacity(capacity);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }
        if self.path.as_os_str().is_empty() {
            return Err("store path must not be empty".to_string());
        }
        if self.path.file_name().is_none() {
            return Err(format!(
                "store path '{}' must name a file",
                self.path.display()
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}
