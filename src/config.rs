use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the worker is registered for. Requests to any other origin are not intercepted.
  pub origin: Url,
  pub cache: CacheConfig,
  pub routes: RouteConfig,
  pub sync: SyncConfig,
  pub notifications: NotificationConfig,
  pub network: NetworkConfig,
  /// Path of the cache database (default: $XDG_DATA_HOME/vior-sw/cache.db)
  pub database: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      cache: CacheConfig::default(),
      routes: RouteConfig::default(),
      sync: SyncConfig::default(),
      notifications: NotificationConfig::default(),
      network: NetworkConfig::default(),
      database: None,
    }
  }
}

fn default_origin() -> Url {
  Url::parse("http://localhost:5173/").expect("default origin is a valid URL")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Prefix shared by every partition name
  pub prefix: String,
  /// Version embedded in partition names. Bumping it invalidates every partition.
  pub version: String,
  /// Paths cached at install time. Hashed bundle names must match the build output.
  pub static_assets: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: "pritechvior".to_string(),
      version: "v2.0.0".to_string(),
      static_assets: [
        "/",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
        "/offline.html",
        "/assets/index-CMjK9cw3.css",
        "/assets/index-e-GuRZr5.js",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
  /// Paths starting with this prefix use the network-first strategy
  pub api_prefix: String,
  /// URLs containing this marker are stored in the static partition
  pub assets_marker: String,
  pub root_page: String,
  pub offline_page: String,
}

impl Default for RouteConfig {
  fn default() -> Self {
    Self {
      api_prefix: "/api/".to_string(),
      assets_marker: "/assets/".to_string(),
      root_page: "/".to_string(),
      offline_page: "/offline.html".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Only sync events carrying this tag trigger the API refresh sweep
  pub tag: String,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      tag: "background-sync".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub title: String,
  pub default_body: String,
  pub icon: String,
  pub badge: String,
  pub action_icon: String,
  pub vibrate: Vec<u32>,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      title: "PRITECH VIOR".to_string(),
      default_body: "New notification from PRITECH VIOR".to_string(),
      icon: "/icons/icon-192x192.png".to_string(),
      badge: "/icons/icon-72x72.png".to_string(),
      action_icon: "/icons/icon-72x72.png".to_string(),
      vibrate: vec![100, 50, 100],
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  /// Request timeout. Unset means whatever the HTTP stack enforces.
  pub timeout_secs: Option<u64>,
}

/// The three partition names of one worker generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
  pub static_assets: String,
  pub dynamic: String,
  pub api: String,
}

impl CacheNames {
  /// Partitions allowed to survive activation.
  pub fn whitelist(&self) -> [&str; 3] {
    [&self.static_assets, &self.dynamic, &self.api]
  }

  pub fn contains(&self, name: &str) -> bool {
    self.whitelist().contains(&name)
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vior-sw.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vior-sw/config.yaml
  ///
  /// `VIOR_SW_ORIGIN` overrides the configured origin.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(origin) = std::env::var("VIOR_SW_ORIGIN") {
      config.set_origin(&origin)?;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("vior-sw.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("vior-sw").join("config.yaml");
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
    Ok(config)
  }

  pub fn set_origin(&mut self, origin: &str) -> Result<()> {
    self.origin = Url::parse(origin).map_err(|e| eyre!("Invalid origin '{}': {}", origin, e))?;
    Ok(())
  }

  /// Names of the static, dynamic and API partitions for the configured version.
  pub fn cache_names(&self) -> CacheNames {
    let CacheConfig { prefix, version, .. } = &self.cache;
    CacheNames {
      static_assets: format!("{}-static-{}", prefix, version),
      dynamic: format!("{}-dynamic-{}", prefix, version),
      api: format!("{}-api-{}", prefix, version),
    }
  }

  /// Resolve a path (or absolute URL) against the origin.
  pub fn resolve(&self, target: &str) -> Result<Url> {
    self
      .origin
      .join(target)
      .map_err(|e| eyre!("Invalid request target '{}': {}", target, e))
  }

  /// Get the cache database path.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("vior-sw").join("cache.db"))
  }
}
