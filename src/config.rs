use crate::error::ConfigError;
use crate::photo::PhotoSettings;
use crate::view::DEFAULT_STEP;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

pub fn project_dirs() -> Result<directories::ProjectDirs, ConfigError> {
    directories::ProjectDirs::from("org", "birdnerd", "birdnerd").ok_or(ConfigError::NoHome)
}

/// Settings read from `config.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// JSON species catalog; defaults to `birds.json` in the data dir.
    pub catalog: Option<PathBuf>,
    /// Local store; defaults to `birdnerd.db` in the data dir.
    pub database: Option<PathBuf>,
    pub page_step: usize,
    /// Rows above and below the viewport that still trigger image resolution.
    pub look_ahead_rows: u32,
    pub photo_max_dimension: u32,
    pub jpeg_quality: u8,
    pub max_photo_bytes: usize,
    pub request_timeout_secs: u64,
    pub inaturalist_url: String,
    pub wikipedia_url: String,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: None,
            database: None,
            page_step: DEFAULT_STEP,
            look_ahead_rows: 12,
            photo_max_dimension: 1200,
            jpeg_quality: 80,
            max_photo_bytes: 4 * 1024 * 1024,
            request_timeout_secs: 10,
            inaturalist_url: "https://api.inaturalist.org".to_string(),
            wikipedia_url: "https://en.wikipedia.org".to_string(),
            user_agent: concat!("birdnerd/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Load `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => project_dirs()?.config_dir().join(CONFIG_FILE),
        };
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::parse(&path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalize())
    }

    /// Clamp values into their usable ranges.
    pub fn normalize(mut self) -> Self {
        self.page_step = self.page_step.max(1);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.photo_max_dimension = self.photo_max_dimension.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self.inaturalist_url = self.inaturalist_url.trim_end_matches('/').to_string();
        self.wikipedia_url = self.wikipedia_url.trim_end_matches('/').to_string();
        self
    }

    /// Catalog location; relative paths live in the data dir.
    pub fn catalog_path(&self) -> Result<PathBuf, ConfigError> {
        data_path(self.catalog.as_deref(), "birds.json")
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        data_path(self.database.as_deref(), "birdnerd.db")
    }

    pub fn photo(&self) -> PhotoSettings {
        PhotoSettings {
            max_dimension: self.photo_max_dimension,
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn data_path(configured: Option<&Path>, default: &str) -> Result<PathBuf, ConfigError> {
    match configured {
        Some(p) if p.is_absolute() => Ok(p.to_path_buf()),
        Some(p) => Ok(resolve_in(project_dirs()?.data_dir(), p)),
        None => Ok(project_dirs()?.data_dir().join(default)),
    }
}

fn resolve_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
