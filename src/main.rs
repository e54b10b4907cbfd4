use clap::{Parser, Subcommand};
use kotiz::application::orchestrator::{CheckoutSettings, ContributionOrchestrator};
use kotiz::application::pools::PoolService;
use kotiz::application::reconciler::WebhookReconciler;
use kotiz::config::PaymentConfig;
use kotiz::domain::ports::{LedgerStoreBox, PaymentGatewayBox};
use kotiz::infrastructure::http_gateway::HttpPaymentGateway;
use kotiz::infrastructure::in_memory::InMemoryLedgerStore;
#[cfg(feature = "storage-rocksdb")]
use kotiz::infrastructure::rocksdb::RocksDBStore;
use kotiz::infrastructure::sandbox::SandboxGateway;
use kotiz::interfaces::csv::pool_writer::PoolReportWriter;
use kotiz::interfaces::http::{self, AppState};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the contribution API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Write the pool balance audit as CSV to stdout
    Report,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match db_path {
        Some(path) => {
            info!(path = %path.display(), "opening RocksDB ledger");
            Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    if let Some(path) = db_path {
        warn!(
            path = %path.display(),
            "built without storage-rocksdb, falling back to in-memory storage"
        );
    }
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

fn open_gateway(config: &PaymentConfig) -> Result<PaymentGatewayBox> {
    if config.is_sandbox() {
        warn!("PAYMENT_API_BASE_URL is not set, using the sandbox payment gateway");
        Ok(Arc::new(
            SandboxGateway::new(&config.secret_key).into_diagnostic()?,
        ))
    } else {
        Ok(Arc::new(HttpPaymentGateway::new(config).into_diagnostic()?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `report` output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    // Load optional .env file (ignored if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let store = open_store(cli.db_path)?;

    match cli.command {
        Command::Serve { bind } => {
            let config = PaymentConfig::from_env().into_diagnostic()?;
            let gateway = open_gateway(&config)?;

            let state = AppState {
                orchestrator: Arc::new(ContributionOrchestrator::new(
                    store.clone(),
                    gateway.clone(),
                    CheckoutSettings::from(&config),
                )),
                reconciler: Arc::new(WebhookReconciler::new(store.clone(), gateway)),
                pools: Arc::new(PoolService::new(store)),
            };

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .into_diagnostic()?;
            info!("API listening on http://{}", bind);
            axum::serve(listener, http::router(state))
                .await
                .into_diagnostic()?;
        }
        Command::Report => {
            let audits = PoolService::new(store).audit_all().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = PoolReportWriter::new(stdout.lock());
            writer.write_audits(audits).into_diagnostic()?;
        }
    }

    Ok(())
}
