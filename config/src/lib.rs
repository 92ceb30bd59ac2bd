//! Shade Configuration
//!
//! Shared configuration crate for every Shade component.
//!
//! Handles loading configuration from:
//! 1. SHADE_CONFIG env var (explicit path)
//! 2. ./shade.toml (current directory)
//! 3. ~/.shade/shade.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ShadeConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "shade.toml";
const CONFIG_DIR_NAME: &str = ".shade";

// ============================================================================
// Default Constants
// ============================================================================

pub const DEFAULT_TREE_DEPTH: usize = 20;
pub const MAX_TREE_DEPTH: usize = 32;
/// Largest decoy count whose positions fit a 16-bit index
pub const MAX_DECOYS: usize = u16::MAX as usize - 1;
const DEFAULT_ROOT_HISTORY: usize = 30;
const DEFAULT_DECOY_COUNT: usize = 3;
const DEFAULT_KEY_CACHE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_SYNC_PAGE_SIZE: usize = 500;
const DEFAULT_SYNC_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadeConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub decoys: DecoyConfig,
    #[serde(default)]
    pub proving: ProvingConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Commitment tree shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_depth")]
    pub depth: usize,
    #[serde(default = "default_root_history")]
    pub root_history: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            root_history: DEFAULT_ROOT_HISTORY,
        }
    }
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}
fn default_root_history() -> usize {
    DEFAULT_ROOT_HISTORY
}

/// Decoy outputs per transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoyConfig {
    #[serde(default = "default_decoy_count")]
    pub count: usize,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_DECOY_COUNT,
        }
    }
}

fn default_decoy_count() -> usize {
    DEFAULT_DECOY_COUNT
}

/// Proving backend mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProvingMode {
    #[default]
    Production,
    /// Proofs carry no zero-knowledge guarantee; development only
    Simulated,
}

impl ProvingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvingMode::Production => "production",
            ProvingMode::Simulated => "simulated",
        }
    }
}

impl std::str::FromStr for ProvingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(ProvingMode::Production),
            "simulated" => Ok(ProvingMode::Simulated),
            other => Err(format!("unknown proving mode: {other}")),
        }
    }
}

/// Proving configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvingConfig {
    #[serde(default)]
    pub mode: ProvingMode,
    #[serde(default)]
    pub allow_simulated: bool,
    /// Directory holding circuit artifacts and their manifest
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,
}

/// Unlocked-key cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_KEY_CACHE_TTL_SECS,
        }
    }
}

impl KeyConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_cache_ttl() -> u64 {
    DEFAULT_KEY_CACHE_TTL_SECS
}

/// Ledger sync paging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_SYNC_PAGE_SIZE,
            page_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
        }
    }
}

impl SyncConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }
}

fn default_page_size() -> usize {
    DEFAULT_SYNC_PAGE_SIZE
}
fn default_page_timeout() -> u64 {
    DEFAULT_SYNC_TIMEOUT_MS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Key lookup used for overrides (the process environment by default)
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str, field: &mut T) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {key}={v}"),
        }
    }
}

/// Set Option<PathBuf> from env var if present
fn env_option_path(lookup: Lookup<'_>, key: &str, field: &mut Option<PathBuf>) {
    if let Some(v) = lookup(key) {
        *field = Some(PathBuf::from(v));
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(lookup: Lookup<'_>, key: &str) -> Option<bool> {
    lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadeConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHADE_CONFIG env var
        if let Ok(path) = env::var("SHADE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SHADE_CONFIG points at missing file: {}", path.display());
        }

        // 2. Check ./shade.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shade/shade.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(&|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: Lookup<'_>) {
        // Tree
        env_parse(lookup, "SHADE_TREE_DEPTH", &mut self.tree.depth);

        // Decoys
        env_parse(lookup, "SHADE_DECOY_COUNT", &mut self.decoys.count);

        // Proving
        env_parse(lookup, "SHADE_PROVING_MODE", &mut self.proving.mode);
        if let Some(v) = env_bool(lookup, "SHADE_ALLOW_SIMULATED") {
            self.proving.allow_simulated = v;
        }
        env_option_path(lookup, "SHADE_ARTIFACTS_DIR", &mut self.proving.artifacts_dir);

        // Keys
        env_parse(lookup, "SHADE_KEY_CACHE_TTL", &mut self.keys.cache_ttl_secs);

        // Sync
        env_parse(lookup, "SHADE_SYNC_PAGE_SIZE", &mut self.sync.page_size);
        env_parse(lookup, "SHADE_SYNC_TIMEOUT_MS", &mut self.sync.page_timeout_ms);
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tree.depth == 0 || self.tree.depth > MAX_TREE_DEPTH {
            bail!(
                "tree.depth must be within 1..={MAX_TREE_DEPTH}, got {}",
                self.tree.depth
            );
        }
        if self.decoys.count == 0 || self.decoys.count > MAX_DECOYS {
            bail!(
                "decoys.count must be within 1..={MAX_DECOYS}, got {}",
                self.decoys.count
            );
        }
        if self.proving.mode == ProvingMode::Simulated && !self.proving.allow_simulated {
            bail!("proving.mode = \"simulated\" requires proving.allow_simulated = true");
        }
        if self.sync.page_size == 0 {
            bail!("sync.page_size must be at least 1");
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.proving.artifacts_dir = Some(PathBuf::from("./circuits"));
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShadeConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ShadeConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ShadeConfig) -> Result<(), ShadeConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ShadeConfig::global()`.
#[inline]
pub fn global_config() -> &'static ShadeConfig {
    ShadeConfig::global()
}

// ============================================================================
// Tests
// ============================================================================
