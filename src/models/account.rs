use serde::Deserialize;
use std::path::Path;

use super::{Result, SeedError};

/// One managed account, parsed from its raw session seed.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub username: Option<String>,
    /// Value of `start_param`; only needed when logging in.
    pub referral: Option<String>,
    pub raw_seed: String,
}

#[derive(Debug, Deserialize)]
struct Identity {
    id: serde_json::Value,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl Account {
    /// Parse a raw seed of the form `query_id=..&user=<percent-encoded json>&..&start_param=..`.
    pub fn from_seed(raw_seed: &str) -> std::result::Result<Self, SeedError> {
        let encoded_user = query_field(raw_seed, "user").ok_or(SeedError::MissingField("user"))?;

        let user_json = urlencoding::decode(encoded_user).map_err(|e| SeedError::InvalidEncoding {
            field: "user",
            message: e.to_string(),
        })?;

        let identity: Identity = serde_json::from_str(&user_json)
            .map_err(|e| SeedError::MalformedIdentity(e.to_string()))?;

        let id = match identity.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            other => {
                return Err(SeedError::MalformedIdentity(format!(
                    "`id` must be a number or non-empty string, got {}",
                    other
                )))
            }
        };

        let display_name = identity
            .first_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| identity.username.clone())
            .unwrap_or_else(|| id.clone());

        let referral = query_field(raw_seed, "start_param").map(str::to_string);

        Ok(Self {
            id,
            display_name,
            username: identity.username,
            referral,
            raw_seed: raw_seed.to_string(),
        })
    }

    pub fn referral(&self) -> std::result::Result<&str, SeedError> {
        self.referral
            .as_deref()
            .ok_or(SeedError::MissingField("start_param"))
    }
}

fn query_field<'a>(seed: &'a str, key: &str) -> Option<&'a str> {
    seed.split('&').find_map(|pair| match pair.split_once('=') {
        Some((k, v)) if k == key => Some(v),
        _ => None,
    })
}

/// Read the newline-delimited seed file. Each non-empty line is one account.
pub fn load_seeds<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_seed_lines(&content))
}

pub fn parse_seed_lines(content: &str) -> Vec<String> {
    content
        .replace('\r', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
