use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use vendor_disclosure::cli::{Cli, Commands};
use vendor_disclosure::config::Config;
use vendor_disclosure::extractors::PartnerPage;
use vendor_disclosure::logging;
use vendor_disclosure::network::{FetchError, Fetcher, HttpClient};
use vendor_disclosure::responder::{QueryError, QueryResponder};
use vendor_disclosure::router::{DispatchTable, VisitOutcome, VisitRouter};
use vendor_disclosure::sandbox::{LocalSandbox, SandboxProvisioner};
use vendor_disclosure::visit_cache::{
    reset_on_install, JsonFileSessionStore, SessionStore, StoreError,
};

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MainError {
    fn exit_code(&self) -> i32 {
        match self {
            MainError::Logging(_) | MainError::Store(_) | MainError::Json(_) => 3,
            MainError::Fetch(_) | MainError::Query(_) => 4,
        }
    }
}

/// Wire the HTTP client, offscreen sandbox and extractors into a router
fn build_router(
    store: Arc<dyn SessionStore>,
    user_agent: String,
    timeout: Option<u64>,
) -> Result<VisitRouter, MainError> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpClient::with_options(
        user_agent,
        timeout.map(Duration::from_secs),
        Config::MAX_CONTENT_SIZE,
    )?);

    let sandbox = Arc::new(LocalSandbox::new(
        Arc::clone(&fetcher),
        vec![PartnerPage::amazon()],
    ));
    let provisioner = Arc::new(SandboxProvisioner::new(sandbox));

    Ok(VisitRouter::new(
        store,
        DispatchTable::standard(fetcher, provisioner),
    ))
}

async fn run(cli: Cli) -> Result<(), MainError> {
    let store: Arc<dyn SessionStore> = Arc::new(JsonFileSessionStore::new(&cli.session_file));

    match cli.command {
        Commands::Visit {
            urls,
            user_agent,
            timeout,
        } => {
            let router = build_router(Arc::clone(&store), user_agent, timeout)?;

            let outcomes = join_all(urls.iter().map(|url| router.visit(url))).await;
            for (url, outcome) in urls.iter().zip(outcomes) {
                match outcome {
                    Ok(VisitOutcome::Recorded { vendors }) => {
                        tracing::info!(url = %url, vendors = ?vendors, "visited")
                    }
                    Ok(outcome) => tracing::info!(url = %url, outcome = ?outcome, "skipped"),
                    // Lookups are best-effort: report and keep going
                    Err(e) => tracing::warn!(url = %url, error = %e, "vendor lookup failed"),
                }
            }

            println!("{}", serde_json::to_string_pretty(&store.get().await?)?);
        }
        Commands::Query { url } => {
            let responder = QueryResponder::new(store);
            let entry = responder.get_entry(&url).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Commands::Reset => {
            reset_on_install(store.as_ref()).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let init = match &cli.log_dir {
        Some(dir) => logging::init_logging(dir),
        None => logging::init_stderr_logging(),
    };
    if let Err(e) = init.map_err(|e| MainError::Logging(e.to_string())) {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
