//! Configuration for runscope.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (RUNSCOPE_HOME, RUNSCOPE_STORE)
//! 2. Config file (.runscope/config.yaml)
//! 3. Defaults (~/.runscope, store at ~/.runscope/metadata.db)
//!
//! Config file discovery:
//! - Searches current directory and parents for .runscope/config.yaml
//! - The store path in the config file is relative to the project root
//!   (the directory containing .runscope/)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::materializers::MaterializerRegistry;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".runscope";
const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_STORE_FILE: &str = "metadata.db";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub materializers: MaterializersConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Metadata database path (relative to the project root)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterializersConfig {
    /// Recorded identifier -> registered identifier
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to runscope home
    pub home: PathBuf,
    /// Metadata database to read
    pub store_path: PathBuf,
    /// Materializer aliases
    pub aliases: BTreeMap<String, String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Built-in materializers plus the configured aliases
    pub fn registry(&self) -> MaterializerRegistry {
        let mut registry = MaterializerRegistry::with_builtins();
        for (alias, target) in &self.aliases {
            registry.alias(alias.clone(), target.clone());
        }
        registry
    }
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Resolve configuration starting the file search at `start`
fn load_config_from(
    start: &Path,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let config_file = find_config_file(start);

    let (home, store_path, aliases) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // Project root is the parent of .runscope/
        let base_dir = config_path
            .parent() // .runscope/
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        let home = if let Some(env_home) = env("RUNSCOPE_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.home {
            resolve_path(base_dir, home_path)
        } else {
            default_home
        };

        let store_path = if let Some(env_store) = env("RUNSCOPE_STORE") {
            PathBuf::from(env_store)
        } else if let Some(ref store_path) = config.store.path {
            resolve_path(base_dir, store_path)
        } else {
            home.join(DEFAULT_STORE_FILE)
        };

        (home, store_path, config.materializers.aliases)
    } else {
        let home = env("RUNSCOPE_HOME")
            .map(PathBuf::from)
            .unwrap_or(default_home);

        let store_path = env("RUNSCOPE_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(DEFAULT_STORE_FILE));

        (home, store_path, BTreeMap::new())
    };

    Ok(ResolvedConfig {
        home,
        store_path,
        aliases,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    load_config_from(&cwd, default_home, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the runscope home directory
pub fn runscope_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the metadata database path
pub fn store_path() -> Result<PathBuf> {
    Ok(config()?.store_path.clone())
}
