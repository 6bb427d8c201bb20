//! Vacancy-related models

use serde::{Deserialize, Serialize};

/// Vacancy entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: Option<String>,
}
