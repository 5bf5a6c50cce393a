use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const VAULT_DIR: &str = "VAULT_DIR";
    /// Name of the hidden storage directory created under the vault root.
    pub const INDEX_DIR_NAME: &str = "VAULT_INDEX_DIR_NAME";
    pub const GC_INTERVAL_SECS: &str = "VAULT_GC_INTERVAL_SECS";
    /// Set to "false" or "0" to run without the file-system watcher.
    /// Default: true.
    pub const WATCH: &str = "VAULT_WATCH";
    pub const READ_POOL_SIZE: &str = "VAULT_READ_POOL_SIZE";
}

/// Default values
pub mod defaults {
    pub const VAULT_DIR: &str = "./vault";
    pub const INDEX_DIR_NAME: &str = ".vault-index";
    pub const DB_FILE_NAME: &str = "index.db";
    pub const PAGES_DIR: &str = "pages";
    pub const ASSETS_DIR: &str = "assets";
    pub const GC_INTERVAL_SECS: u64 = 300;
    pub const READ_POOL_SIZE: u32 = 4;
}

/// Configuration for the vault indexing engine
#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// Root of the note vault
    pub vault_dir: PathBuf,
    /// Hidden directory under the vault holding the index database
    pub index_dir_name: String,
    /// How often a garbage collection pass is enqueued
    pub gc_interval: Duration,
    /// Whether to start the file-system watcher
    pub watch: bool,
    /// Number of pooled read-only connections
    pub read_pool_size: u32,
}

impl IndexerConfig {
    pub fn new(vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            index_dir_name: defaults::INDEX_DIR_NAME.to_string(),
            gc_interval: Duration::from_secs(defaults::GC_INTERVAL_SECS),
            watch: true,
            read_pool_size: defaults::READ_POOL_SIZE,
        }
    }

    pub fn from_env() -> Self {
        let vault_dir = env::var(env_vars::VAULT_DIR)
            .unwrap_or_else(|_| defaults::VAULT_DIR.to_string());

        let gc_interval_secs = env::var(env_vars::GC_INTERVAL_SECS)
            .ok()
            .and_then(|v| {
                v.parse::<u64>()
                    .map_err(|e| log::warn!("Invalid {}: {} ({})", env_vars::GC_INTERVAL_SECS, v, e))
                    .ok()
            })
            .unwrap_or(defaults::GC_INTERVAL_SECS);

        let read_pool_size = env::var(env_vars::READ_POOL_SIZE)
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults::READ_POOL_SIZE);

        Self {
            vault_dir: PathBuf::from(vault_dir),
            index_dir_name: env::var(env_vars::INDEX_DIR_NAME)
                .unwrap_or_else(|_| defaults::INDEX_DIR_NAME.to_string()),
            gc_interval: Duration::from_secs(gc_interval_secs.max(1)),
            watch: env::var(env_vars::WATCH)
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            read_pool_size,
        }
    }

    /// Builder-style toggle for the watcher (tests run without it)
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Clamped to at least one millisecond; the timer cannot tick on a zero period
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Get the internal storage directory (`<vault>/.vault-index`)
    pub fn index_dir(&self) -> PathBuf {
        self.vault_dir.join(&self.index_dir_name)
    }

    /// Get the path to the index database
    pub fn db_path(&self) -> PathBuf {
        self.index_dir().join(defaults::DB_FILE_NAME)
    }

    /// Directory new notes are created in
    pub fn pages_dir(&self) -> PathBuf {
        self.vault_dir.join(defaults::PAGES_DIR)
    }
}

/// Create the vault root, its default `pages/` and `assets/` directories, and the
/// internal storage directory. Existing directories are left untouched.
pub fn initialize_vault(config: &IndexerConfig) -> std::io::Result<()> {
    let vault: &Path = &config.vault_dir;
    std::fs::create_dir_all(vault)?;
    std::fs::create_dir_all(vault.join(defaults::PAGES_DIR))?;
    std::fs::create_dir_all(vault.join(defaults::ASSETS_DIR))?;
    std::fs::create_dir_all(config.index_dir())?;
    log::info!("Vault directory: {:?}", vault);
    log::info!("Index directory: {:?}", config.index_dir());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_hang_off_vault() {
        let config = IndexerConfig::new("/tmp/my-vault");
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/my-vault/.vault-index"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/my-vault/.vault-index/index.db"));
        assert_eq!(config.pages_dir(), PathBuf::from("/tmp/my-vault/pages"));
    }

    #[test]
    fn test_zero_gc_interval_is_clamped() {
        let config = IndexerConfig::new("/tmp/my-vault").with_gc_interval(Duration::ZERO);
        assert_eq!(config.gc_interval, Duration::from_millis(1));
        let config = config.with_gc_interval(Duration::from_secs(90));
        assert_eq!(config.gc_interval, Duration::from_secs(90));
    }

    #[test]
    fn test_initialize_vault_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = IndexerConfig::new(dir.path().join("vault"));

        initialize_vault(&config).unwrap();
        std::fs::write(config.pages_dir().join("keep.md"), "keep").unwrap();
        initialize_vault(&config).unwrap();

        assert!(config.vault_dir.join("assets").is_dir());
        assert!(config.index_dir().is_dir());
        assert!(config.pages_dir().join("keep.md").exists());
    }
}
