use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use chrono::DateTime;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    api::RewardApi,
    models::{Account, LoginRequest, Result, RewardBotError, Session, TokenRecord},
    session::token_store::{fingerprint, TokenStore},
    utils::Clock,
};

/// What a token's payload says about its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenExpiry {
    /// Epoch seconds after which the token is no longer valid
    ExpiresAt(i64),
    NonExpiring,
    Undecodable(String),
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn inspect_token(token: &str) -> TokenExpiry {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() < 3 || segments[1].is_empty() {
        return TokenExpiry::Undecodable(format!("expected 3 segments, got {}", segments.len()));
    }

    let bytes = match decode_segment(segments[1]) {
        Some(bytes) => bytes,
        None => return TokenExpiry::Undecodable("payload is not base64".to_string()),
    };

    let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => return TokenExpiry::Undecodable(format!("payload is not JSON: {}", e)),
    };

    let claims = match payload.as_object() {
        Some(claims) => claims,
        None => return TokenExpiry::Undecodable("payload is not a JSON object".to_string()),
    };

    match claims.get("exp") {
        None | Some(serde_json::Value::Null) => TokenExpiry::NonExpiring,
        Some(exp) => match exp.as_i64().or_else(|| exp.as_f64().map(|f| f.floor() as i64)) {
            Some(exp) => TokenExpiry::ExpiresAt(exp),
            None => TokenExpiry::Undecodable(format!("`exp` is not numeric: {}", exp)),
        },
    }
}

impl TokenExpiry {
    /// Fail-closed: anything undecodable counts as expired.
    pub fn is_expired_at(&self, now_seconds: i64) -> bool {
        match self {
            TokenExpiry::ExpiresAt(exp) => now_seconds > *exp,
            TokenExpiry::NonExpiring => false,
            TokenExpiry::Undecodable(_) => true,
        }
    }
}

// Accepts both base64 alphabets, with or without padding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    STANDARD_NO_PAD.decode(normalized).ok()
}

/// Keeps each account authenticated, logging in again only when needed.
pub struct SessionManager {
    api: Arc<dyn RewardApi>,
    store: TokenStore,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn RewardApi>, store: TokenStore, clock: Arc<dyn Clock>) -> Self {
        Self { api, store, clock }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn is_expired(&self, token: &str) -> bool {
        let expiry = inspect_token(token);
        let expired = expiry.is_expired_at(self.clock.now_seconds());

        match &expiry {
            TokenExpiry::ExpiresAt(exp) => {
                if let Some(at) = DateTime::from_timestamp(*exp, 0) {
                    debug!("Token expires at {} (expired: {})", at.format("%Y-%m-%d %H:%M:%S"), expired);
                }
            }
            TokenExpiry::NonExpiring => warn!("Token carries no expiry, treating it as non-expiring"),
            TokenExpiry::Undecodable(reason) => {
                warn!("Could not read token expiry ({}), treating it as expired", reason)
            }
        }

        expired
    }

    /// Reuse `cached` while it is valid, otherwise log in and persist the new token.
    pub async fn ensure_session(
        &self,
        account: &Account,
        cached: Option<&TokenRecord>,
    ) -> Result<Session> {
        match cached {
            Some(record) if !self.is_expired(&record.token) => {
                info!("Token for {} is still valid, reusing it", account.display_name);
                return Ok(Session::from(record));
            }
            Some(_) => info!("Token for {} has expired, logging in again", account.display_name),
            None => info!("No token cached for {}, logging in", account.display_name),
        }

        let request = LoginRequest::for_account(account)?;
        let grant = self
            .api
            .login(&request)
            .await
            .map_err(|e| RewardBotError::SessionEstablishmentFailed {
                account: account.id.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "Logged in as {}{}",
            account.display_name,
            if grant.is_new { " (new account)" } else { "" }
        );

        match self.store.save(&account.id, &grant.token, &account.raw_seed) {
            Ok(record) => Ok(Session::from(&record)),
            Err(e) => {
                warn!("Failed to persist token for {}: {}", account.id, e);
                Ok(Session {
                    token: grant.token,
                    fingerprint: fingerprint(&account.raw_seed),
                })
            }
        }
    }
}
