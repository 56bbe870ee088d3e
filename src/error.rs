use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the species catalog. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog {path} is not a valid record list: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {0} appears more than once in the catalog")]
    DuplicateId(String),

    #[error("Record {0} has no name in any language")]
    Nameless(String),
}

/// Errors raised by the persistent local store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),

    #[error("Stored value for {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Photo of {size} bytes exceeds the {limit} byte storage limit")]
    CapacityExceeded { size: usize, limit: usize },
}

/// Errors from photo capture: reading, decoding and re-encoding.
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single provider lookup that produced nothing usable.
///
/// These never reach the user; the resolver logs them and moves on.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {0}")]
    Status(u16),

    #[error("Invalid provider URL: {0}")]
    Url(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config {path} is invalid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine a home directory")]
    NoHome,
}

/// Umbrella error for everything the application shell handles.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Photo(#[from] PhotoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key bindings: {0}")]
    Bindings(String),
}

impl AppError {
    /// Short message suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Catalog(e) => format!("Catalog could not be loaded: {}", e),
            AppError::Store(StoreError::CapacityExceeded { .. })
            | AppError::Photo(PhotoError::Store(StoreError::CapacityExceeded { .. })) => {
                "Photo is too large to save on this device".to_string()
            }
            AppError::Store(e) => format!("Could not save: {}", e),
            AppError::Photo(PhotoError::Read { path, .. }) => {
                format!("Cannot open {}", path.display())
            }
            AppError::Photo(PhotoError::Image(_)) => "That file is not a readable image".to_string(),
            AppError::Photo(PhotoError::Store(e)) => format!("Photo not saved: {}", e),
            AppError::Config(e) => format!("Configuration error: {}", e),
            AppError::Io(e) => format!("File system error: {}", e),
            AppError::Bindings(msg) => format!("Key binding error: {}", msg),
        }
    }
}
