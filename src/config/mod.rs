//! Vault configuration and the on-disk state document used by the CLI.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    chain::{BlockCounter, Height},
    custody::Treasury,
    ledger::{LedgerSnapshot, Vault, VaultError},
    scenario::Harness,
};

/// 100 blocks, as used on local test networks. About 7200 blocks is one day on Ethereum mainnet.
pub const DEFAULT_LOCK_DURATION: Height = 100;
pub const DEFAULT_STATE_FILE: &str = "vault-state.json";
pub const STATE_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported state version {0}")]
    UnsupportedVersion(u8),
    #[error("state file {0} already exists")]
    AlreadyInitialized(PathBuf),
    #[error("state file {0} not found (run `vault init` first)")]
    NotInitialized(PathBuf),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VaultConfig {
    pub lock_duration: Height,
    pub state_path: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            lock_duration: DEFAULT_LOCK_DURATION,
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl VaultConfig {
    /// Reads a JSON config; missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = read_file(path)?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Everything the CLI needs to resume a vault between invocations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateFile {
    pub version: u8,
    pub chain: BlockCounter,
    pub ledger: LedgerSnapshot,
    pub treasury: Treasury,
}

impl StateFile {
    pub fn capture(harness: &Harness) -> Self {
        Self {
            version: STATE_VERSION,
            chain: harness.chain,
            ledger: harness.vault.snapshot(),
            treasury: harness.treasury.clone(),
        }
    }

    pub fn into_harness(self) -> Result<Harness, ConfigError> {
        if self.version != STATE_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        Ok(Harness {
            vault: Vault::restore(self.ledger)?,
            treasury: self.treasury,
            chain: self.chain,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotInitialized(path.to_path_buf()));
        }
        let bytes = read_file(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "loaded state");
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_file(path, &json)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    // readers only ever see a complete file
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).map_err(io_err)?;
    f.write_all(bytes).map_err(io_err)?;
    f.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKey;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "timelock-vault-{name}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = scratch_dir("config");
        let path = dir.join("vault.json");
        fs::write(&path, br#"{ "lock_duration": 50 }"#).unwrap();
        let cfg = VaultConfig::load(&path).unwrap();
        assert_eq!(cfg.lock_duration, 50);
        assert_eq!(cfg.state_path, PathBuf::from(DEFAULT_STATE_FILE));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn state_file_round_trips_through_disk() {
        let dir = scratch_dir("state");
        let path = dir.join("nested").join("state.json");
        let alice = AccountKey::from_bytes(&[9u8; 32]).address();

        let mut harness = Harness::new(20);
        harness.treasury.fund(&alice, 1_000).unwrap();
        harness.deposit(&alice, 400).unwrap();
        harness.mine(5);

        StateFile::capture(&harness).save(&path).unwrap();
        let resumed = StateFile::load(&path).unwrap().into_harness().unwrap();
        assert_eq!(resumed.chain.height(), harness.chain.height());
        assert_eq!(resumed.vault.balance(&alice), 400);
        assert_eq!(resumed.vault.unlock_block(&alice), 21);
        assert_eq!(resumed.treasury, harness.treasury);
        assert_eq!(resumed.vault.events(), harness.vault.events());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_state_and_bad_version_are_reported() {
        let dir = scratch_dir("missing");
        assert!(matches!(
            StateFile::load(&dir.join("absent.json")),
            Err(ConfigError::NotInitialized(_))
        ));
        let mut state = StateFile::capture(&Harness::new(1));
        state.version = 9;
        assert!(matches!(
            state.into_harness(),
            Err(ConfigError::UnsupportedVersion(9))
        ));
        fs::remove_dir_all(dir).ok();
    }
}
