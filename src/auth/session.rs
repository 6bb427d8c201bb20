//! Login, logout and session status

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;

use super::refresh::TokenPayload;
use super::tokens::{TokenRecord, TokenStore};
use crate::api::client::{ApiClient, ApiError, ApiRequest};
use crate::models::User;

/// Lifetime assumed when `/login` does not say.
pub const DEFAULT_LOGIN_EXPIRES_IN: u64 = 36_000;

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Log in with email and password and store the issued tokens.
///
/// Returns the user profile when the backend sends one.
pub async fn login(client: &ApiClient, credentials: &Credentials) -> Result<Option<User>> {
    tracing::info!("Logging in as {}...", credentials.email);

    let request = ApiRequest::post("/login")
        .json(serde_json::to_value(credentials)?)
        .without_refresh();
    let resp = client.send(&request).await.map_err(login_error)?;

    let value: Value = resp.json().await.context("Failed to parse login response")?;
    let payload = TokenPayload::from_value(value).context("Failed to parse login response")?;
    let access_token = payload
        .access_token()
        .context("Unexpected server response: missing access_token")?
        .to_string();

    // No refresh token means the access token doubles as one.
    let refresh_token = payload
        .refresh_token()
        .map(String::from)
        .unwrap_or_else(|| access_token.clone());

    let store = client.token_store();
    store.set_tokens(&TokenRecord {
        access_token,
        refresh_token,
        expires_in: payload.expires_in().unwrap_or(DEFAULT_LOGIN_EXPIRES_IN),
    });

    if let Some(user) = &payload.user {
        store.set_user(user.display_name(), &user.email);
    }

    tracing::info!("Login successful");
    Ok(payload.user)
}

/// Map a failed `/login` call to a message fit for the user.
fn login_error(err: ApiError) -> anyhow::Error {
    match err.status() {
        Some(401) => return anyhow!("Invalid credentials"),
        Some(422) => return anyhow!("Check the entered data"),
        _ => {}
    }

    let detail = err
        .body()
        .and_then(|body| serde_json::from_str::<Value>(body).ok())
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(String::from));
    match detail {
        Some(detail) => anyhow!(detail),
        None => anyhow::Error::new(err).context("Login failed"),
    }
}

/// Tell the backend we are leaving, then forget the session regardless.
pub async fn logout(client: &ApiClient) -> Result<()> {
    let store = client.token_store();

    if store.access_token().is_some() {
        let request = ApiRequest::post("/logout")
            .json(serde_json::json!({}))
            .without_refresh();
        if let Err(e) = client.send(&request).await {
            tracing::warn!("Logout request failed: {}", e);
        }
    }

    store.clear_tokens();
    store.clear_user();
    println!("Logged out.");
    Ok(())
}

/// Display current auth status
pub fn status(store: &TokenStore) {
    match store.access_token() {
        Some(_) if store.is_token_valid() => println!("Access token:  valid"),
        Some(_) => println!("Access token:  expired"),
        None => println!("Access token:  none"),
    }
    if let Some(exp) = store.expires_at() {
        println!("  expires_at:  {}", format_timestamp(exp as i64));
    }

    match store.refresh_token() {
        Some(_) => println!("Refresh token: present"),
        None => println!("Refresh token: none"),
    }

    if let Some(claims) = store.claims() {
        println!("Claims:");
        println!("  subject:     {}", claims.sub.as_deref().unwrap_or("(none)"));
        println!("  email:       {}", claims.email.as_deref().unwrap_or("(none)"));
        println!("  role:        {}", claims.role.as_deref().unwrap_or("(none)"));
        if let Some(exp) = claims.exp {
            println!("  exp:         {}", format_timestamp(exp));
        }
    }

    let (full_name, email) = store.user();
    if full_name.is_some() || email.is_some() {
        println!(
            "User:          {} <{}>",
            full_name.as_deref().unwrap_or("(unknown)"),
            email.as_deref().unwrap_or("(unknown)")
        );
    }

    if store.access_token().is_none() {
        println!("\nRun 'recruit-cli login' to authenticate.");
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
