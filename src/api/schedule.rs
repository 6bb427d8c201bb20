//! Interview scheduling

use anyhow::{Context, Result};
use serde_json::Value;

use super::client::{ApiClient, ApiRequest};

/// Ask the backend to send an interview invitation for a candidate.
pub async fn send_invite(client: &ApiClient, candidate_id: u64, email: &str) -> Result<Value> {
    anyhow::ensure!(email.contains('@'), "Not an email address: {}", email);

    let request = ApiRequest::post("/schedule/invite").json(serde_json::json!({
        "candidate_id": candidate_id,
        "email": email,
    }));

    let resp = client
        .send(&request)
        .await
        .context("Sending interview invite failed")?;
    let text = resp.text().await.context("Failed to read invite response")?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
