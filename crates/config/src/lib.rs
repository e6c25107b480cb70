//! Layered configuration for modvfs.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults,
//! 2. one configuration file: an explicit path, or the first of
//!    `config.toml`, `config.yaml` and `config.json` found in the platform
//!    configuration directory,
//! 3. environment variables prefixed with `MODVFS_`, with `__` separating
//!    nested keys (`MODVFS_CACHE__TTL=3600`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const ENV_PREFIX: &str = "MODVFS_";
const FILE_NAMES: [&str; 3] = ["config.toml", "config.yaml", "config.json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identifier scheme, as in `modland:/Authors/B`.
    pub scheme: String,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub io: IoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the paginated listing pages.
    pub catalog_url: String,
    /// Base URL that track paths (`/pub/...`) are resolved against.
    pub storage_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Index database and content cache location. Defaults to the platform
    /// cache directory.
    pub directory: Option<PathBuf>,
    /// Seconds a refreshed listing is trusted.
    pub ttl: u64,
    pub serve_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Files of at least this many bytes are memory-mapped.
    pub mmap_threshold: u64,
    /// Starting buffer size for reads of unknown length.
    pub initial_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheme: "modland".to_string(),
            remote: RemoteConfig::default(),
            cache: CacheConfig::default(),
            io: IoConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://www.exotica.org.uk/mediawiki/index.php?title=Special:Modland".to_string(),
            storage_url: "https://ftp.modland.com".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { directory: None, ttl: 24 * 60 * 60, serve_stale: true }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self { mmap_threshold: 128 * 1024, initial_buffer: 256 * 1024 }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "modvfs").ok_or_raise(|| ErrorKind::NoHome)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    Ok(match extension.to_ascii_lowercase().as_str() {
        "toml" => figment.merge(Toml::file_exact(path)),
        "yaml" | "yml" => figment.merge(Yaml::file_exact(path)),
        "json" => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::Invalid("configuration file extension")),
    })
}

impl Config {
    /// Load configuration from all layers and validate it.
    ///
    /// An explicit `path` replaces the lookup in the platform configuration
    /// directory and must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_dir = match path {
            Some(_) => None,
            None => project_dirs().ok().map(|dirs| dirs.config_dir().to_path_buf()),
        };
        Self::from_figment(Self::figment(path, config_dir.as_deref())?)
    }

    fn figment(path: Option<&Path>, config_dir: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match (path, config_dir) {
            (Some(path), _) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Missing(path.display().to_string()));
                }
                figment = merge_file(figment, path)?;
            },
            (None, Some(dir)) => {
                if let Some(found) = FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file()) {
                    tracing::debug!(path = %found.display(), "Using configuration file");
                    figment = merge_file(figment, &found)?;
                }
            },
            (None, None) => {},
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut chars = self.scheme.chars();
        let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            exn::bail!(ErrorKind::Invalid("scheme"));
        }
        self.remote.catalog_url()?;
        self.remote.storage_url()?;
        if self.cache.ttl == 0 {
            exn::bail!(ErrorKind::Invalid("cache.ttl"));
        }
        if self.io.mmap_threshold == 0 {
            exn::bail!(ErrorKind::Invalid("io.mmap_threshold"));
        }
        if self.io.initial_buffer == 0 {
            exn::bail!(ErrorKind::Invalid("io.initial_buffer"));
        }
        Ok(())
    }
}

fn base_url(value: &str, field: &'static str) -> Result<Url> {
    let url = Url::parse(value).or_raise(|| ErrorKind::Invalid(field))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        exn::bail!(ErrorKind::Invalid(field));
    }
    Ok(url)
}

impl RemoteConfig {
    pub fn catalog_url(&self) -> Result<Url> {
        base_url(&self.catalog_url, "remote.catalog_url")
    }

    pub fn storage_url(&self) -> Result<Url> {
        base_url(&self.storage_url, "remote.storage_url")
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    /// The configured cache directory, or the platform cache directory.
    pub fn directory(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(directory) => Ok(directory.clone()),
            None => Ok(project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    /// Location of the persistent index database.
    pub fn index_path(&self) -> Result<PathBuf> {
        Ok(self.directory()?.join("index.sqlite"))
    }

    /// Root of the content cache.
    pub fn content_directory(&self) -> Result<PathBuf> {
        Ok(self.directory()?.join("content"))
    }
}
