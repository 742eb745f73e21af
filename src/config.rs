//! Configuration for the library stores.
//!
//! Sources, later ones winning: built-in defaults, an optional config file
//! (format inferred from its extension), then `LIBRARY_STORE_*` environment
//! variables (e.g. `LIBRARY_STORE_FLUSH_ON_WRITE=false`).

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "LIBRARY_STORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory holding one JSON file per entity type.
    pub data_dir: PathBuf,
    pub users_file: String,
    pub books_file: String,
    /// Flush the whole store after every add/update.
    pub flush_on_write: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            users_file: "users.json".to_string(),
            books_file: "books.json".to_string(),
            flush_on_write: true,
            log_filter: "info".to_string(),
        }
    }
}

/// Manager write policy derived from the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub flush_on_write: bool,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            flush_on_write: true,
        }
    }
}

impl LibraryConfig {
    /// Load configuration from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }

    pub fn books_path(&self) -> PathBuf {
        self.data_dir.join(&self.books_file)
    }

    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy {
            flush_on_write: self.flush_on_write,
        }
    }
}
