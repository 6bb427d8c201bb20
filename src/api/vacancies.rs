//! Vacancy endpoints

use super::client::{ApiClient, ApiError, ApiRequest};
use crate::models::Vacancy;

pub async fn list_vacancies(client: &ApiClient) -> Result<Vec<Vacancy>, ApiError> {
    client.send_json(&ApiRequest::get("/vacancies")).await
}

/// Background variant of [`list_vacancies`]; a newer poll cancels this one.
pub async fn poll_vacancies(client: &ApiClient) -> Result<Vec<Vacancy>, ApiError> {
    client
        .poll_json("vacancies", &ApiRequest::get("/vacancies"))
        .await
}

pub async fn get_vacancy(client: &ApiClient, id: u64) -> Result<Vacancy, ApiError> {
    client
        .send_json(&ApiRequest::get(format!("/vacancy/{}", id)))
        .await
}

pub async fn delete_vacancy(client: &ApiClient, id: u64) -> Result<(), ApiError> {
    client
        .send(&ApiRequest::delete(format!("/vacancy/{}", id)))
        .await?;
    Ok(())
}

pub fn print_vacancies(vacancies: &[Vacancy]) {
    if vacancies.is_empty() {
        println!("No vacancies.");
        return;
    }

    println!();
    println!("{:<6} {:<40} {}", "ID", "TITLE", "LOCATION");
    for vacancy in vacancies {
        println!(
            "{:<6} {:<40} {}",
            vacancy.id,
            truncate(&vacancy.title, 40),
            vacancy.location.as_deref().unwrap_or("-")
        );
    }
}

pub fn print_vacancy(vacancy: &Vacancy) {
    println!();
    println!("Vacancy #{}", vacancy.id);
    println!("  Title:       {}", vacancy.title);
    println!("  Location:    {}", vacancy.location.as_deref().unwrap_or("-"));
    println!("  Created:     {}", vacancy.created_at.as_deref().unwrap_or("-"));
    if let Some(description) = &vacancy.description {
        println!();
        println!("{}", description);
    }
}

/// Cut `s` to at most `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
