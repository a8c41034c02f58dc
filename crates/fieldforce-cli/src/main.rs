//! fieldforce - command-line client for the field-force automation API.
//!
//! Signs in once and keeps the session between runs; expired access tokens
//! are renewed transparently. Results are printed as JSON on stdout.

mod commands;
mod fields;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fieldforce_core::auth::{AuthState, SessionManager};
use fieldforce_core::{ApiClient, AuthError, Config, HttpTransport};

const USAGE: &str = "\
Usage: fieldforce [--log-file] <command> [args] [-m <comments>]

Commands:
  login [email]                 Sign in (prompts for the password)
  logout                        Forget the stored session
  whoami                        Show the signed-in user
  status                        Show session and configuration state
  dashboard                     Show the dashboard for your role
  leaves [list [page]|types|show ID|new FIELDS|edit ID FIELDS|approve ID|reject ID|cancel ID]
      fields: type= start= end= reason=
  expenses [list [page]|types|show ID|new FIELDS|edit ID FIELDS|approve ID|reject ID|query ID|cancel ID]
      fields: type= amount= date= description= receipt=PATH
  tours [list [page]|show ID|new FIELDS|edit ID FIELDS|submit ID|approve ID|reject ID]
      fields: month= year= area=
  dcrs [list [page]|show ID|new FIELDS|edit ID FIELDS|delete ID]
      fields: date= work=field_work|office_work|leave|holiday summary= doctors=1,2 chemists=3
  doctors [list [page]|specialties|show ID|new FIELDS|edit ID FIELDS|delete ID]
      fields: name= specialty= location= phone= email=
  chemists [list [page]|categories|show ID|new FIELDS|edit ID FIELDS|delete ID]
      fields: name= category= location= phone= email=
  notifications [list [page]|read ID|read-all]
  reports [dcr|expense|leave|performance] [START END]

Set RUST_LOG=debug for verbose logs.";

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "fieldforce.log";

#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub command: String,
    pub rest: Vec<String>,
    /// Reviewer comments given with `-m`.
    pub comments: Option<String>,
    pub log_file: bool,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut positional = Vec::new();
    let mut raw = raw.into_iter();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--log-file" => args.log_file = true,
            "-m" | "--message" => match raw.next() {
                Some(comments) => args.comments = Some(comments),
                None => bail!("{} requires a value", arg),
            },
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    args.command = positional.next().unwrap_or_else(|| "help".to_string());
    args.rest = positional.collect();
    Ok(args)
}

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr, and to a daily rolling file when `log_dir` is given.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = parse_args(std::env::args().skip(1))?;
    if matches!(args.command.as_str(), "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    // Held until exit so buffered log lines are flushed
    let _log_guard = init_tracing(args.log_file.then_some(cache_dir.as_path()));
    info!(command = %args.command, api = %config.api_base_url, "fieldforce starting");

    let store = config.open_token_store(&cache_dir)?;
    let state = Arc::new(AuthState::restored(store.access_token().is_some()));
    let transport = HttpTransport::with_timeout(config.request_timeout())?;
    let session = Arc::new(SessionManager::new(
        Arc::new(transport),
        config.endpoints(),
        store,
        state,
    ));
    let client = ApiClient::new(session);

    let result = commands::run(&client, &mut config, &args).await;
    if let Err(ref err) = result {
        if err
            .downcast_ref::<AuthError>()
            .is_some_and(AuthError::requires_login)
        {
            eprintln!("Not signed in or session expired. Run `fieldforce login`.");
        }
    }
    result
}
