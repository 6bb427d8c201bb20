//! Candidate endpoints

use super::client::{ApiClient, ApiError, ApiRequest};
use super::vacancies::truncate;
use crate::models::Candidate;

pub async fn list_candidates(client: &ApiClient) -> Result<Vec<Candidate>, ApiError> {
    client.send_json(&ApiRequest::get("/candidates")).await
}

/// Background variant of [`list_candidates`]; a newer poll cancels this one.
pub async fn poll_candidates(client: &ApiClient) -> Result<Vec<Candidate>, ApiError> {
    client
        .poll_json("candidates", &ApiRequest::get("/candidates"))
        .await
}

pub async fn get_candidate(client: &ApiClient, id: u64) -> Result<Candidate, ApiError> {
    client
        .send_json(&ApiRequest::get(format!("/candidate/{}", id)))
        .await
}

pub async fn delete_candidate(client: &ApiClient, id: u64) -> Result<(), ApiError> {
    client
        .send(&ApiRequest::delete(format!("/candidate/{}", id)))
        .await?;
    Ok(())
}

fn label<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("No candidates.");
        return;
    }

    println!();
    println!(
        "{:<6} {:<30} {:<8} {:<14} {}",
        "ID", "NAME", "VACANCY", "RESUME", "CALL"
    );
    for candidate in candidates {
        println!(
            "{:<6} {:<30} {:<8} {:<14} {}",
            candidate.id,
            truncate(candidate.full_name.as_deref().unwrap_or("(unnamed)"), 30),
            label(candidate.vacancy_id),
            label(candidate.resume_analysis),
            label(candidate.call_status),
        );
    }
}

pub fn print_candidate(candidate: &Candidate) {
    println!();
    println!(
        "Candidate #{}: {}",
        candidate.id,
        candidate.full_name.as_deref().unwrap_or("(unnamed)")
    );
    println!("  Email:       {}", candidate.email.as_deref().unwrap_or("-"));
    println!("  Vacancy:     {}", label(candidate.vacancy_id));
    println!("  Resume:      {}", label(candidate.resume_analysis));
    println!("  Call:        {}", label(candidate.call_status));
    if let Some(date) = &candidate.call_date {
        println!("  Call date:   {}", date);
    }
    if let Some(link) = &candidate.call_link {
        println!("  Call link:   {}", link);
    }
    if let Some(comments) = &candidate.comments {
        println!("  Comments:    {}", comments);
    }
}
