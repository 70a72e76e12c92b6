use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::StoreNames;

pub const DEFAULT_OFFLINE_BODY: &str = "Offline - Unable to fetch resource";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the app is served from; only requests to it are intercepted
  pub origin: Url,
  pub cache: CacheConfig,
  /// Paths relative to the app root, fetched and stored at install
  pub static_assets: Vec<String>,
  /// Weather API host whose requests go network-first
  pub api_host: String,
  /// Body of the synthetic 503 served for unreachable static assets
  pub offline_body: String,
  /// Store database location (defaults to the user data directory)
  pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub prefix: String,
  /// Bumping this invalidates every store of the previous version
  #[serde(deserialize_with = "deserialize_version")]
  pub version: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: "weather-app".to_string(),
      version: "1".to_string(),
    }
  }
}

/// Accept `version: 2` as well as `version: "2"`.
fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v = serde_yaml::Value::deserialize(deserializer)?;
  match v {
    serde_yaml::Value::String(s) => Ok(s),
    serde_yaml::Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "cache version must be a string or number, got {:?}",
      other
    ))),
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      cache: CacheConfig::default(),
      static_assets: ["./", "./index.html", "./styles.css", "./app.js", "./manifest.json"]
        .into_iter()
        .map(String::from)
        .collect(),
      api_host: "api.openweathermap.org".to_string(),
      offline_body: DEFAULT_OFFLINE_BODY.to_string(),
      database: None,
    }
  }
}

fn default_origin() -> Url {
  Url::parse("http://localhost:8080/").unwrap_or_else(|_| unreachable!("static URL parses"))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./weather-sw.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/weather-sw/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  /// `WEATHER_SW_ORIGIN` overrides the configured origin.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        tracing::debug!("No configuration file found, using defaults");
        Self::default()
      }
    };

    config.with_env_overrides()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("weather-sw.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("weather-sw").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  fn with_env_overrides(mut self) -> Result<Self> {
    if let Ok(origin) = std::env::var("WEATHER_SW_ORIGIN") {
      self.origin = Url::parse(&origin)
        .map_err(|e| eyre!("Invalid WEATHER_SW_ORIGIN '{}': {}", origin, e))?;
    }
    self.validate()?;
    Ok(self)
  }

  fn validate(&self) -> Result<()> {
    if self.origin.cannot_be_a_base() || self.origin.host_str().is_none() {
      return Err(eyre!("origin must be an absolute http(s) URL: {}", self.origin));
    }
    if self.cache.prefix.is_empty() || self.cache.version.is_empty() {
      return Err(eyre!("cache prefix and version must not be empty"));
    }
    Ok(())
  }

  /// Names of the two stores for the configured version.
  pub fn store_names(&self) -> StoreNames {
    StoreNames::new(&self.cache.prefix, &self.cache.version)
  }

  /// Resolve every static asset path against the app origin.
  pub fn static_asset_urls(&self) -> Result<Vec<Url>> {
    self
      .static_assets
      .iter()
      .map(|path| {
        self
          .origin
          .join(path)
          .map_err(|e| eyre!("Invalid static asset path '{}': {}", path, e))
      })
      .collect()
  }
}
