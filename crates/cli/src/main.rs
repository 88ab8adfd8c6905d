//! `pomgmt` -- command-line client for the PO management API.
//!
//! Signs in, browses and exports the merged PO/acceptance data, uploads
//! source files and prints the dashboard overview. The session is kept on
//! disk between runs.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                                 | Description                    |
//! |------------------------|----------|-----------------------------------------|--------------------------------|
//! | `API_BASE_URL`         | no       | `http://localhost:8000`                 | Remote API base URL            |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                                    | Per-request timeout            |
//! | `PAGE_SIZE`            | no       | `50`                                    | Rows per page for `data`       |
//! | `SESSION_FILE`         | no       | `<data-local-dir>/pomgmt/session.json`  | Persisted session location     |
//! | `PO_PASSWORD`          | no       | --                                      | Password for `login`           |

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pomgmt_client::data_view::ViewStatus;
use pomgmt_client::{AuthState, Client, ClientConfig, UploadCandidate};
use pomgmt_core::error::ErrorKind;
use pomgmt_core::query::{FilterField, QueryParameters, Record};
use pomgmt_core::upload::{FileKind, RejectionReason, UploadOutcome};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pomgmt", version, about = "PO management client")]
struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// List one page of merged PO data.
    Data {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Download the rows matching the filters as a spreadsheet.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Upload a PO or acceptance file for processing.
    Upload {
        #[arg(long, help = "po or acceptance")]
        kind: FileKind,
        path: PathBuf,
    },
    /// Print headline counters and chart data.
    Dashboard,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Login { .. } => "login",
            Commands::Logout => "logout",
            Commands::Whoami => "whoami",
            Commands::Data { .. } => "data",
            Commands::Export { .. } => "export",
            Commands::Upload { .. } => "upload",
            Commands::Dashboard => "dashboard",
        }
    }
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn apply(self, params: &mut QueryParameters) {
        let values = [
            (FilterField::Status, self.status),
            (FilterField::Category, self.category),
            (FilterField::ProjectName, self.project),
            (FilterField::Search, self.search),
        ];
        for (field, value) in values {
            if let Some(value) = value {
                params.set_filter(field, value);
            }
        }
    }
}

#[derive(Serialize)]
struct JsonOut<T: Serialize> {
    ok: bool,
    data: T,
}

/// A failed API call, with a hint when retrying could help.
fn api_failure(message: String, kind: Option<ErrorKind>) -> anyhow::Error {
    if kind.is_some_and(ErrorKind::is_retryable) {
        anyhow::anyhow!("{message} (temporary failure, try again)")
    } else {
        anyhow::anyhow!(message)
    }
}

fn print_json<T: Serialize>(data: T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&JsonOut { ok: true, data })?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pomgmt_cli=info,pomgmt_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let client = Client::new(config).context("failed to build HTTP client")?;

    let state = client.auth.bootstrap();
    let cancel = CancellationToken::new();
    let listener = client.auth.spawn_expiry_listener(cancel.clone());

    let command = cli.command.name();
    tracing::debug!(command, authenticated = state.is_authenticated(), "Running command");
    let result = run(&client, state, cli.command, cli.json).await;
    if let Err(e) = &result {
        tracing::debug!(command, error = %e, "Command failed");
    }

    cancel.cancel();
    if let Err(e) = listener.await {
        tracing::warn!(error = %e, "Session listener task failed");
    }
    result
}

async fn run(client: &Client, state: AuthState, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => {
            let identity = client
                .auth
                .login(&username, &password)
                .await
                .map_err(|failure| anyhow::anyhow!(failure.message))?;
            if json {
                print_json(&identity)?;
            } else {
                println!("Signed in as {} <{}>", identity.display_name, identity.email);
            }
        }
        Commands::Logout => {
            client.auth.logout();
            if json {
                print_json(serde_json::json!({ "signed_out": true }))?;
            } else {
                println!("Signed out");
            }
        }
        Commands::Whoami => match (&state.identity, json) {
            (identity, true) => print_json(identity)?,
            (Some(identity), false) => {
                println!("{} <{}> (id {})", identity.display_name, identity.email, identity.id)
            }
            (None, false) => println!("Not signed in"),
        },
        Commands::Data {
            filters,
            page,
            per_page,
        } => {
            require_auth(&state)?;
            let mut params = client.query_parameters(per_page)?;
            filters.apply(&mut params);
            params.set_page(page, None);

            let snapshot = client.data_view(params).load().await;
            if snapshot.status == ViewStatus::Error {
                return Err(api_failure(
                    snapshot
                        .error_message
                        .unwrap_or_else(|| "Failed to load data".to_string()),
                    snapshot.error_kind,
                ));
            }
            if json {
                return print_json(&snapshot);
            }

            let Some(result) = &snapshot.result else {
                bail!("Failed to load data");
            };
            for record in &result.items {
                println!("{}", record_line(record));
            }
            println!("{}", result.summary());
            let window: Vec<String> = snapshot
                .page_window
                .iter()
                .map(|n| {
                    if *n == snapshot.params.page() {
                        format!("[{n}]")
                    } else {
                        n.to_string()
                    }
                })
                .collect();
            println!(
                "Page {} of {}: {}",
                snapshot.params.page(),
                result.total_pages,
                window.join(" ")
            );
        }
        Commands::Export { out, filters } => {
            require_auth(&state)?;
            let mut params = client.query_parameters(None)?;
            filters.apply(&mut params);

            let file = client
                .data_view(params)
                .export()
                .await
                .map_err(|e| api_failure(e.user_message("Failed to export data"), Some(e.kind())))?;
            let path = out.unwrap_or_else(|| PathBuf::from(&file.file_name));
            tokio::fs::write(&path, &file.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;

            if json {
                print_json(serde_json::json!({
                    "path": path,
                    "bytes": file.bytes.len(),
                }))?;
            } else {
                println!("Saved {} bytes to {}", file.bytes.len(), path.display());
            }
        }
        Commands::Upload { kind, path } => {
            require_auth(&state)?;
            let candidate = UploadCandidate::from_path(&path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?;
            let attempt = client.uploads().submit(candidate, kind).await;

            if json {
                print_json(&attempt)?;
            }
            let message = attempt.message.clone().unwrap_or_default();
            if attempt.outcome != UploadOutcome::Accepted {
                let kind = match &attempt.rejection_reason {
                    Some(RejectionReason::Dispatch { kind, .. }) => Some(*kind),
                    _ => None,
                };
                return Err(api_failure(message, kind));
            }
            if !json {
                println!("{message}");
            }
        }
        Commands::Dashboard => {
            require_auth(&state)?;
            let overview = client
                .api
                .dashboard_overview()
                .await
                .map_err(|e| {
                    api_failure(e.user_message("Failed to load dashboard data"), Some(e.kind()))
                })?;
            if json {
                return print_json(&overview);
            }
            let stats = &overview.basic_stats;
            println!("Merged records: {}", stats.total_merged_records);
            println!("Total value:    {:.0}", stats.total_value);
            println!("POs:            {}", stats.total_pos);
            println!("Acceptances:    {}", stats.total_acceptances);
        }
    }
    Ok(())
}

fn require_auth(state: &AuthState) -> anyhow::Result<()> {
    if !state.is_authenticated() {
        bail!("Not signed in. Run `pomgmt login` first.");
    }
    Ok(())
}

/// One-line rendering of a merged row.
fn record_line(record: &Record) -> String {
    let field = |key: &str| match record.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    };
    format!(
        "{:<14} {:<24} {:<20} {:?}",
        field("po_number"),
        field("project_name"),
        field("status"),
        record.status_category(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_carry_a_retry_hint() {
        let err = api_failure("Failed to load data".into(), Some(ErrorKind::Transient));
        assert_eq!(err.to_string(), "Failed to load data (temporary failure, try again)");

        let err = api_failure("Invalid status value".into(), Some(ErrorKind::ClientError));
        assert_eq!(err.to_string(), "Invalid status value");

        let err = api_failure("File size must be less than 50MB".into(), None);
        assert_eq!(err.to_string(), "File size must be less than 50MB");
    }

    #[test]
    fn filters_are_applied_to_the_query() {
        let mut params = QueryParameters::default();
        FilterArgs {
            status: Some("Closed".into()),
            project: Some("North".into()),
            ..Default::default()
        }
        .apply(&mut params);

        let query = params.to_query();
        assert!(query.contains(&("status", "Closed".to_string())));
        assert!(query.contains(&("project_name", "North".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "category"));
    }

    #[test]
    fn cli_parses_upload_kind() {
        let cli = Cli::try_parse_from(["pomgmt", "upload", "--kind", "acceptance", "acc.csv"]).unwrap();
        assert_eq!(cli.command.name(), "upload");
        assert!(matches!(
            cli.command,
            Commands::Upload { kind: FileKind::Acceptance, .. }
        ));
    }
}
