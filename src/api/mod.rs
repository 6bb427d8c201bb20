//! API client module for the recruiting backend

mod candidates;
pub mod client;
pub mod files;
mod me;
mod schedule;
mod vacancies;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use client::{ApiClient, ApiError};
use files::DownloadKind;

/// List vacancies, optionally re-polling every `watch` seconds
pub async fn list_vacancies(client: Arc<ApiClient>, watch: Option<u64>) -> Result<()> {
    match watch {
        None => {
            let vacancies = vacancies::list_vacancies(&client).await?;
            vacancies::print_vacancies(&vacancies);
            Ok(())
        }
        Some(secs) => {
            watch_listing(
                client,
                secs,
                |c| async move { vacancies::poll_vacancies(&c).await },
                vacancies::print_vacancies,
            )
            .await
        }
    }
}

/// Show a single vacancy
pub async fn show_vacancy(client: &ApiClient, id: u64) -> Result<()> {
    let vacancy = vacancies::get_vacancy(client, id).await?;
    vacancies::print_vacancy(&vacancy);
    Ok(())
}

/// Delete a vacancy
pub async fn delete_vacancy(client: &ApiClient, id: u64) -> Result<()> {
    vacancies::delete_vacancy(client, id).await?;
    println!("Vacancy {} deleted.", id);
    Ok(())
}

/// List candidates, optionally re-polling every `watch` seconds
pub async fn list_candidates(client: Arc<ApiClient>, watch: Option<u64>) -> Result<()> {
    match watch {
        None => {
            let candidates = candidates::list_candidates(&client).await?;
            candidates::print_candidates(&candidates);
            Ok(())
        }
        Some(secs) => {
            watch_listing(
                client,
                secs,
                |c| async move { candidates::poll_candidates(&c).await },
                candidates::print_candidates,
            )
            .await
        }
    }
}

/// Show a single candidate
pub async fn show_candidate(client: &ApiClient, id: u64) -> Result<()> {
    let candidate = candidates::get_candidate(client, id).await?;
    candidates::print_candidate(&candidate);
    Ok(())
}

/// Delete a candidate
pub async fn delete_candidate(client: &ApiClient, id: u64) -> Result<()> {
    candidates::delete_candidate(client, id).await?;
    println!("Candidate {} deleted.", id);
    Ok(())
}

/// Upload a vacancy description file
pub async fn upload_vacancy(client: &ApiClient, file: &Path) -> Result<()> {
    let response = files::upload_vacancy_file(client, file).await?;
    println!("Uploaded {}.", file.display());
    print_response(&response);
    Ok(())
}

/// Add a candidate with one or more resumes
pub async fn add_candidate(client: &ApiClient, vacancy_id: u64, resumes: &[PathBuf]) -> Result<()> {
    let response = files::add_candidate(client, vacancy_id, resumes).await?;
    println!(
        "Submitted {} resume(s) for vacancy {}.",
        resumes.len(),
        vacancy_id
    );
    print_response(&response);
    Ok(())
}

/// Download a vacancy file or a resume into `dir`
pub async fn download(client: &ApiClient, kind: DownloadKind, id: u64, dir: &Path) -> Result<()> {
    let path = files::download_to(client, kind, id, dir).await?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Send an interview invitation
pub async fn invite(client: &ApiClient, candidate_id: u64, email: &str) -> Result<()> {
    let response = schedule::send_invite(client, candidate_id, email).await?;
    println!("Invitation sent to {}.", email);
    print_response(&response);
    Ok(())
}

/// Show the logged-in user as the backend sees it
pub async fn whoami(client: &ApiClient) -> Result<()> {
    let user = me::current_user(client).await?;
    me::print_user(&user);
    Ok(())
}

fn print_response(value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::String(text) if text.is_empty() => {}
        serde_json::Value::String(text) => println!("{}", text),
        other => println!(
            "{}",
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
        ),
    }
}

/// Re-fetch a listing on a fixed interval until Ctrl+C.
///
/// Each tick spawns a poll; a poll still running when the next tick fires is
/// cancelled by the client, so a slow backend never piles up requests.
async fn watch_listing<T, F, Fut>(
    client: Arc<ApiClient>,
    interval_secs: u64,
    fetch: F,
    print: fn(&[T]),
) -> Result<()>
where
    T: Send + 'static,
    F: Fn(Arc<ApiClient>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tx = tx.clone();
                let poll = fetch(Arc::clone(&client));
                tokio::spawn(async move {
                    let _ = tx.send(poll.await);
                });
            }
            Some(result) = rx.recv() => match result {
                Ok(items) => {
                    println!("\n[{}]", chrono::Local::now().format("%H:%M:%S"));
                    print(&items);
                }
                Err(ApiError::Cancelled(key)) => {
                    tracing::debug!("Poll of {} superseded", key);
                }
                Err(e @ ApiError::SessionExpired(_)) => return Err(e.into()),
                Err(e) => tracing::warn!("Refresh of listing failed: {}", e),
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped.");
                return Ok(());
            }
        }
    }
}
