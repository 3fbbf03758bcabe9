use serde::{Deserialize, Serialize};

use super::{Account, SeedError};

/// Persisted authentication material for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: String,
    #[serde(alias = "initData")]
    pub raw_seed: String,
    #[serde(alias = "tp")]
    pub fingerprint: String,
}

/// Credentials attached to every authenticated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub fingerprint: String,
}

impl From<&TokenRecord> for Session {
    fn from(record: &TokenRecord) -> Self {
        Self {
            token: record.token.clone(),
            fingerprint: record.fingerprint.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub init_data: String,
    pub rel: String,
    pub give: u32,
}

impl LoginRequest {
    pub fn for_account(account: &Account) -> Result<Self, SeedError> {
        Ok(Self {
            init_data: account.raw_seed.clone(),
            rel: account.referral()?.to_string(),
            give: 0,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoginGrant {
    #[serde(rename = "access_token")]
    pub token: String,
    #[serde(default, deserialize_with = "super::rewards::flag")]
    pub is_new: bool,
}
