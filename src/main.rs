use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use threeds::application::acs::{AccessControlServer, spawn_expiry_sweeper};
use threeds::application::directory::CardRangeDirectory;
use threeds::application::policy::{OutcomeMapping, ThresholdPolicy};
use threeds::application::router::{DirectoryRouter, spawn_routed_sweeper};
use threeds::application::sdk::{ScriptedCardholder, SdkChallengeHandler};
use threeds::application::server::{OriginatorOrchestrator, PaymentDetails, RequestorProfile};
use threeds::config::ThreeDsConfig;
use threeds::domain::card_range::AccountNumber;
use threeds::domain::outcome::CardholderAction;
use threeds::domain::ports::{CardRangeStoreBox, ResultsRelay};
use threeds::infrastructure::in_memory::InMemoryCardRangeStore;
#[cfg(feature = "storage-rocksdb")]
use threeds::infrastructure::rocksdb::RocksDBStore;
use threeds::interfaces::csv::card_range_reader::CardRangeReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Code every in-process issuer service expects from the cardholder.
const ISSUER_ONE_TIME_CODE: &str = "123456";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input card ranges CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Only report ranges written after this serial number
    #[arg(long)]
    serial: Option<u64>,

    /// Account number to run one authentication for
    #[arg(long, requires = "amount")]
    authenticate: Option<AccountNumber>,

    /// Purchase amount for --authenticate, in major units
    #[arg(long)]
    amount: Option<Decimal>,

    /// Code the cardholder enters if the issuer challenges
    #[arg(long, default_value = ISSUER_ONE_TIME_CODE)]
    otp: String,

    /// Purchases above this amount are challenged
    #[arg(long, default_value = "100")]
    frictionless_limit: Decimal,

    #[command(flatten)]
    config: ThreeDsConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<CardRangeStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryCardRangeStore::new()))
        }
        None => Ok(Box::new(InMemoryCardRangeStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    cli.config.validate().into_diagnostic()?;

    let directory = Arc::new(
        CardRangeDirectory::open(open_store(cli.db_path)?)
            .await
            .into_diagnostic()?,
    );

    // Load card range writes
    let file = File::open(&cli.input).into_diagnostic()?;
    for write in CardRangeReader::new(file).writes() {
        match write {
            Ok(write) => {
                if let Err(e) = directory.apply(write).await {
                    warn!("Error applying card range: {}", e);
                }
            }
            Err(e) => {
                warn!("Error reading card range: {}", e);
            }
        }
    }

    let router = Arc::new(DirectoryRouter::new(
        directory.clone(),
        cli.config.clone(),
        "DS_LOCAL",
    ));
    spawn_routed_sweeper(&router, Duration::from_secs(1));
    let dyn_relay: Arc<dyn ResultsRelay> = router.clone();
    let relay = Arc::downgrade(&dyn_relay);

    // One in-process issuer service per issuer target in the directory
    let cardholder = Arc::new(ScriptedCardholder::new([CardholderAction::Submit(cli.otp)]));
    let mut handler = SdkChallengeHandler::new(cardholder, cli.config.max_challenge_rounds);
    let acs_ids: BTreeSet<String> = directory
        .query(None)
        .await
        .into_iter()
        .map(|record| record.range.acs_id)
        .collect();
    for acs_id in acs_ids {
        let acs = Arc::new(AccessControlServer::new(
            acs_id.clone(),
            format!("https://acs.local/{acs_id}/challenge"),
            Arc::new(ThresholdPolicy::new(
                cli.frictionless_limit,
                ISSUER_ONE_TIME_CODE,
            )),
            Arc::new(OutcomeMapping::default()),
            relay.clone(),
            cli.config.clone(),
        ));
        spawn_expiry_sweeper(&acs, Duration::from_secs(1));
        router.register_issuer(acs_id, acs.clone()).await;
        handler = handler.with_service(acs.acs_url().to_string(), acs);
    }

    let orchestrator = OriginatorOrchestrator::new(
        RequestorProfile::default(),
        router.clone(),
        Arc::new(handler),
        cli.config.clone(),
    );
    router
        .register_originator(
            orchestrator.server_ref_number().to_string(),
            orchestrator.results_handler(),
        )
        .await;

    let pres = orchestrator
        .request_card_ranges(cli.serial)
        .await
        .into_diagnostic()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &pres).into_diagnostic()?;
    writeln!(out).into_diagnostic()?;

    if let (Some(account_number), Some(amount)) = (cli.authenticate, cli.amount) {
        info!(pan = %account_number, %amount, "running authentication");
        let outcome = orchestrator
            .authenticate(PaymentDetails::new(account_number, amount))
            .await
            .into_diagnostic()?;
        writeln!(out, "authentication: {:?}", outcome).into_diagnostic()?;
    }

    Ok(())
}
