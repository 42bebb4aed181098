//! Configuration loading, state-directory layout, and credentials for
//! domainclaw.
//!
//! The settings record lives at `~/.domainclaw/config.json` and is loaded
//! once per process; the only mutating path is the init/settings workflow,
//! which re-saves the whole record. Every other reader works from a snapshot
//! copy. The same directory holds the durable stores (operation ledger,
//! confirmation tokens, update cache); see [`StatePaths`].
//!
//! Credentials are never stored in the settings record: they come from the
//! environment first, then from the macOS keychain via the `security`
//! binary (fixed arguments, no shell).

pub mod credentials;
pub mod settings;

pub use credentials::{Credentials, load_credentials};
pub use settings::{CustomerIdSource, Environment, Settings};

use std::path::{Path, PathBuf};

use domainclaw_core::error::{AppError, Result};

/// Directory name under the user's home.
pub const STATE_DIR_NAME: &str = ".domainclaw";

pub const CONFIG_FILE: &str = "config.json";
pub const OPERATIONS_FILE: &str = "operations.jsonl";
pub const TOKENS_FILE: &str = "confirm_tokens.json";
pub const UPDATE_CACHE_FILE: &str = "update_check.json";

/// Resolved locations of every durable file, rooted at one state directory.
///
/// Tests construct these over a temp dir; production uses [`StatePaths::default_location`].
#[derive(Debug, Clone)]
pub struct StatePaths {
    dir: PathBuf,
}

impl StatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The per-user default: `~/.domainclaw`.
    pub fn default_location() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| AppError::internal("cannot locate user home directory"))?;
        Ok(Self::new(Path::new(&home).join(STATE_DIR_NAME)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn operations_file(&self) -> PathBuf {
        self.dir.join(OPERATIONS_FILE)
    }

    pub fn tokens_file(&self) -> PathBuf {
        self.dir.join(TOKENS_FILE)
    }

    pub fn update_cache_file(&self) -> PathBuf {
        self.dir.join(UPDATE_CACHE_FILE)
    }

    /// Create the state directory with owner-only permissions.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }
}

/// Write a state file with owner-only permissions.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
