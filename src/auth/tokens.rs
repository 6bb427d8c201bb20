//! Token storage and management

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::jwt::{self, Claims};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const EXPIRES_AT_KEY: &str = "token_expires_at";
pub const USER_FULL_NAME_KEY: &str = "user_full_name";
pub const USER_EMAIL_KEY: &str = "user_email";

/// A token is treated as expired this many seconds before `expires_at`.
pub const SAFETY_MARGIN_SECS: u64 = 300;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Durable key/value storage backing the token store.
///
/// Writes cannot fail from the caller's point of view: implementations log
/// persistence problems and keep serving the in-memory view.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local storage, used when nothing should touch disk.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<BTreeMap<String, String>>,
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.remove(key);
    }
}

/// Token material handed out by `/login` and `/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds, relative to the moment the record is stored.
    pub expires_in: u64,
}

/// Single source of truth for the session credentials.
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    /// Store a token record, overwriting whatever was there.
    pub fn set_tokens(&self, record: &TokenRecord) {
        self.set_tokens_at(record, unix_now());
    }

    /// Store a token record with `expires_at` computed from `now`.
    pub fn set_tokens_at(&self, record: &TokenRecord, now: u64) {
        let expires_at = now.saturating_add(record.expires_in);
        self.storage.set(ACCESS_TOKEN_KEY, &record.access_token);
        self.storage.set(REFRESH_TOKEN_KEY, &record.refresh_token);
        self.storage.set(EXPIRES_AT_KEY, &expires_at.to_string());
        tracing::debug!("Stored tokens (expires_at: {})", expires_at);
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.storage
            .get(EXPIRES_AT_KEY)
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn is_token_valid(&self) -> bool {
        self.is_token_valid_at(unix_now())
    }

    /// False when there is no token or `now >= expires_at - margin`.
    pub fn is_token_valid_at(&self, now: u64) -> bool {
        if self.access_token().is_none() {
            return false;
        }
        match self.expires_at() {
            Some(exp) => now < exp.saturating_sub(SAFETY_MARGIN_SECS),
            None => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some() && self.is_token_valid()
    }

    /// Access token, only if it is still inside its validity window.
    pub fn valid_access_token(&self) -> Option<String> {
        if self.is_token_valid() {
            self.access_token()
        } else {
            None
        }
    }

    pub fn clear_tokens(&self) {
        self.storage.remove(ACCESS_TOKEN_KEY);
        self.storage.remove(REFRESH_TOKEN_KEY);
        self.storage.remove(EXPIRES_AT_KEY);
    }

    /// Best-effort decode of a token's claims. Never fails, returns `None`.
    pub fn decode(token: &str) -> Option<Claims> {
        jwt::decode(token)
    }

    /// Claims of the stored access token, if it is a decodable JWT.
    pub fn claims(&self) -> Option<Claims> {
        self.access_token().as_deref().and_then(Self::decode)
    }

    pub fn set_user(&self, full_name: &str, email: &str) {
        self.storage.set(USER_FULL_NAME_KEY, full_name);
        self.storage.set(USER_EMAIL_KEY, email);
    }

    /// Stored (full name, email) of the logged-in user.
    pub fn user(&self) -> (Option<String>, Option<String>) {
        (
            self.storage.get(USER_FULL_NAME_KEY),
            self.storage.get(USER_EMAIL_KEY),
        )
    }

    pub fn clear_user(&self) {
        self.storage.remove(USER_FULL_NAME_KEY);
        self.storage.remove(USER_EMAIL_KEY);
    }
}
