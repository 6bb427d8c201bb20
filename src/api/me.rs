//! Current user endpoint (/me)

use super::client::{ApiClient, ApiError, ApiRequest};
use crate::models::User;

pub async fn current_user(client: &ApiClient) -> Result<User, ApiError> {
    client.send_json(&ApiRequest::get("/me")).await
}

pub fn print_user(user: &User) {
    println!();
    println!("Name:  {}", user.display_name());
    println!("Email: {}", if user.email.is_empty() { "(none)" } else { user.email.as_str() });
    println!("Role:  {}", user.role.as_deref().unwrap_or("(none)"));
    if let Some(id) = user.id {
        println!("ID:    {}", id);
    }
}
