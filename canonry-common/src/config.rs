//! Configuration loading and root folder resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: it is logged and the
//! compiled defaults apply.

use crate::lineage::{DEFAULT_LINEAGE_DEPTH, DEFAULT_MAX_LINEAGE_DEPTH};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the data root folder
pub const ROOT_FOLDER_ENV: &str = "CANONRY_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "CANONRY_CONFIG";

/// SQLite database file created inside the root folder
pub const DATABASE_FILE_NAME: &str = "canonry.db";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5760;
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Values used when neither CLI, environment nor config file say otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Lineage traversal bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// Depth used when a lineage request gives none
    pub default_depth: u32,
    /// Largest depth a request may ask for
    pub max_depth: u32,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            default_depth: DEFAULT_LINEAGE_DEPTH,
            max_depth: DEFAULT_MAX_LINEAGE_DEPTH,
        }
    }
}

impl LineageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_depth > self.max_depth {
            return Err(Error::Config(format!(
                "lineage.default_depth ({}) exceeds lineage.max_depth ({})",
                self.default_depth, self.max_depth
            )));
        }
        Ok(())
    }
}

/// Bootstrap configuration read from TOML
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub lineage: LineageConfig,

    /// Per-subscriber buffer of the event bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: None,
            port: None,
            lineage: LineageConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl TomlConfig {
    /// Parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `explicit`, `CANONRY_CONFIG` or the platform locations,
    /// falling back to defaults with a warning
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit.map(Path::to_path_buf).or_else(find_config_file) {
            Some(path) => path,
            None => {
                info!("No config file found, using compiled defaults");
                return Self::default();
            }
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring config file {}: {} (using compiled defaults)",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.lineage.validate()?;
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

/// Locate the config file: `CANONRY_CONFIG`, then the user config dir,
/// then `/etc/canonry/config.toml` on Linux
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(path) = non_empty_env(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("canonry").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/canonry/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the data root folder
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Some(path) = non_empty_env(ROOT_FOLDER_ENV) {
            debug!("Root folder from {}: {}", ROOT_FOLDER_ENV, path);
            return PathBuf::from(path);
        }

        if let Some(path) = &self.toml_root {
            debug!("Root folder from config file: {}", path.display());
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents); safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("canonry"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/canonry"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("canonry"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/canonry"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("canonry"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\canonry"))
    } else {
        PathBuf::from("./canonry_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.lineage.default_depth, 3);
        assert_eq!(config.lineage.max_depth, 10);
        assert_eq!(config.event_capacity, 1000);
    }

    #[test]
    fn test_partial_lineage_section() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 8080
            [lineage]
            max_depth = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.lineage.default_depth, 3);
        assert_eq!(config.lineage.max_depth, 20);
    }

    #[test]
    fn test_lineage_validation() {
        let bad = LineageConfig {
            default_depth: 5,
            max_depth: 2,
        };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
        assert!(LineageConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_event_capacity_is_rejected() {
        let config = TomlConfig {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_arg_wins_over_toml() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolver = RootFolderResolver::new()
            .with_toml_config(&toml)
            .with_cli_arg(Some(PathBuf::from("/from/cli")));
        assert_eq!(resolver.resolve(), PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_initializer_database_path() {
        let initializer = RootFolderInitializer::new(PathBuf::from("/tmp/canonry-root"));
        assert_eq!(
            initializer.database_path(),
            PathBuf::from("/tmp/canonry-root/canonry.db")
        );
    }
}
