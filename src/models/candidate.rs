//! Candidate-related models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of the automatic resume screening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeAnalysis {
    Suitable,
    NotSuitable,
    Analyzing,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ResumeAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Suitable => "suitable",
            Self::NotSuitable => "not suitable",
            Self::Analyzing => "analyzing",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Interview call progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    NotPlanned,
    Planned,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotPlanned => "not planned",
            Self::Planned => "planned",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Candidate entity. The backend has shipped both camelCase and snake_case
/// field names, so both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: u64,
    #[serde(alias = "full_name", alias = "name")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "vacancy_id")]
    pub vacancy_id: Option<u64>,
    #[serde(alias = "resume_analysis")]
    pub resume_analysis: Option<ResumeAnalysis>,
    #[serde(alias = "call_status")]
    pub call_status: Option<CallStatus>,
    pub comments: Option<String>,
    #[serde(alias = "call_date")]
    pub call_date: Option<String>,
    #[serde(alias = "call_link")]
    pub call_link: Option<String>,
}
