//! Recruit CLI - terminal client for the recruiting moderation panel
//!
//! Lists vacancies and candidates, moves resumes in and out, and sends
//! interview invitations against the recruiting CRUD backend.

mod api;
mod auth;
mod config;
mod models;
mod router;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::client::ApiClient;
use api::files::DownloadKind;
use auth::{Credentials, TokenStore};
use config::{Config, FileStorage};
use router::{CliNavigator, Navigation, Route, RouteGuard};

#[derive(Parser)]
#[command(name = "recruit-cli")]
#[command(about = "Lightweight CLI client for the recruiting moderation panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in as a moderator
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Log in again even if the current session is valid
        #[arg(short, long)]
        force: bool,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Show current authentication status
    Status,

    /// Show the logged-in user as the backend sees it
    Whoami,

    /// List vacancies
    Vacancies {
        /// Re-fetch every N seconds until Ctrl+C
        #[arg(short, long)]
        watch: Option<u64>,
    },

    /// Show a vacancy
    Vacancy { id: u64 },

    /// Delete a vacancy
    DeleteVacancy { id: u64 },

    /// Upload a vacancy description file
    UploadVacancy { file: PathBuf },

    /// Download a vacancy file
    DownloadVacancy {
        id: u64,

        /// Target directory (defaults to download_dir from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List candidates
    Candidates {
        /// Re-fetch every N seconds until Ctrl+C
        #[arg(short, long)]
        watch: Option<u64>,
    },

    /// Show a candidate
    Candidate { id: u64 },

    /// Delete a candidate
    DeleteCandidate { id: u64 },

    /// Add a candidate to a vacancy with one or more resumes
    AddCandidate {
        /// Vacancy ID
        #[arg(long)]
        vacancy: u64,

        /// Resume files
        #[arg(required = true)]
        resumes: Vec<PathBuf>,
    },

    /// Download a candidate's resume
    DownloadResume {
        id: u64,

        /// Target directory (defaults to download_dir from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Send an interview invitation to a candidate
    Invite {
        candidate_id: u64,
        email: String,
    },
}

impl Commands {
    /// Panel route a command belongs to; `None` for commands that run
    /// without the route guard.
    fn route(&self) -> Option<Route> {
        match self {
            Commands::Login { .. } => Some(Route::Login),
            Commands::Logout | Commands::Status => None,
            Commands::Candidate { id }
            | Commands::DeleteCandidate { id }
            | Commands::DownloadResume { id, .. } => Some(Route::Candidate { id: *id }),
            Commands::Invite { candidate_id, .. } => Some(Route::Candidate { id: *candidate_id }),
            _ => Some(Route::ModeratorPanel),
        }
    }
}

fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load()?;
    let storage = FileStorage::open_default()?;
    tracing::debug!("Credentials file: {}", storage.path().display());

    let store = Arc::new(TokenStore::new(Arc::new(storage)));
    let navigator = Arc::new(CliNavigator::default());
    let client = Arc::new(ApiClient::new(&config, store.clone(), navigator.clone())?);

    if let Some(route) = cli.command.route() {
        match RouteGuard::new(client.clone()).before_each(&route).await {
            Navigation::Proceed => navigator.enter(route),
            Navigation::Redirect(Route::Login) => {
                bail!("Not logged in or session expired. Run 'recruit-cli login'.");
            }
            Navigation::Redirect(target) => {
                if !matches!(cli.command, Commands::Login { force: true, .. }) {
                    println!(
                        "Already logged in (landing on {}). Use --force to re-authenticate.",
                        target
                    );
                    return Ok(());
                }
                navigator.enter(route);
            }
        }
    }

    match cli.command {
        Commands::Login {
            email,
            password,
            force: _,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            let credentials = Credentials { email, password };
            match auth::login(&client, &credentials).await? {
                Some(user) => println!("Logged in as {}.", user.display_name()),
                None => println!("Login successful."),
            }
        }
        Commands::Logout => {
            tracing::info!("Logging out...");
            auth::logout(&client).await?;
        }
        Commands::Status => {
            auth::status(&store);
        }
        Commands::Whoami => {
            api::whoami(&client).await?;
        }
        Commands::Vacancies { watch } => {
            tracing::info!("Fetching vacancies...");
            api::list_vacancies(client, watch).await?;
        }
        Commands::Vacancy { id } => {
            api::show_vacancy(&client, id).await?;
        }
        Commands::DeleteVacancy { id } => {
            api::delete_vacancy(&client, id).await?;
        }
        Commands::UploadVacancy { file } => {
            tracing::info!("Uploading {}...", file.display());
            api::upload_vacancy(&client, &file).await?;
        }
        Commands::DownloadVacancy { id, out } => {
            let dir = out.unwrap_or_else(|| config.download_dir());
            api::download(&client, DownloadKind::Vacancy, id, &dir).await?;
        }
        Commands::Candidates { watch } => {
            tracing::info!("Fetching candidates...");
            api::list_candidates(client, watch).await?;
        }
        Commands::Candidate { id } => {
            api::show_candidate(&client, id).await?;
        }
        Commands::DeleteCandidate { id } => {
            api::delete_candidate(&client, id).await?;
        }
        Commands::AddCandidate { vacancy, resumes } => {
            tracing::info!("Submitting {} resume(s)...", resumes.len());
            api::add_candidate(&client, vacancy, &resumes).await?;
        }
        Commands::DownloadResume { id, out } => {
            let dir = out.unwrap_or_else(|| config.download_dir());
            api::download(&client, DownloadKind::Resume, id, &dir).await?;
        }
        Commands::Invite {
            candidate_id,
            email,
        } => {
            tracing::info!("Sending invitation...");
            api::invite(&client, candidate_id, &email).await?;
        }
    }

    Ok(())
}
