use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{Result, RewardBotError, TokenRecord};

/// Deterministic fingerprint of a raw seed: lowercase hex MD5.
///
/// An empty seed hashes the literal `"a"`, matching what the service expects.
pub fn fingerprint(raw_seed: &str) -> String {
    let input = if raw_seed.is_empty() { "a" } else { raw_seed };
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// JSON file mapping account id to its [`TokenRecord`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing or unreadable file yields an empty map.
    pub fn load(&self) -> BTreeMap<String, TokenRecord> {
        if !self.path.exists() {
            return BTreeMap::new();
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(RewardBotError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(RewardBotError::from));

        match parsed {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to read token file {}: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    pub fn get(&self, account_id: &str) -> Option<TokenRecord> {
        self.load().remove(account_id)
    }

    /// Store a token for `account_id`, replacing any previous record for it.
    pub fn save(&self, account_id: &str, token: &str, raw_seed: &str) -> Result<TokenRecord> {
        let mut records = self.load();
        let record = TokenRecord {
            token: token.to_string(),
            raw_seed: raw_seed.to_string(),
            fingerprint: fingerprint(raw_seed),
        };
        records.insert(account_id.to_string(), record.clone());

        self.write_atomic(&records)?;
        info!("Saved token for account {}", account_id);

        Ok(record)
    }

    // Write to a sibling temp file, then rename over the store.
    fn write_atomic(&self, records: &BTreeMap<String, TokenRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RewardBotError::TokenStoreError(format!("create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");

        std::fs::write(&tmp_path, json).map_err(|e| {
            RewardBotError::TokenStoreError(format!("write {}: {}", tmp_path.display(), e))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            RewardBotError::TokenStoreError(format!("rename onto {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}
