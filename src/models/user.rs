//! User-related models

use serde::{Deserialize, Serialize};

/// Moderator profile as returned by `/login` and `/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Option<u64>,
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    pub role: Option<String>,
}

impl User {
    /// Username when set, email otherwise.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}
