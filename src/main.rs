use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payroute::application::engine::PaymentEngine;
use payroute::config::{EngineConfig, PauseReadPolicy};
use payroute::domain::amount::Address;
use payroute::domain::ports::{AuditSinkRef, DisbursementStoreBox, ModuleStoreBox, PauseStoreBox};
use payroute::error::{EngineError, Result as EngineResult};
use payroute::infrastructure::in_memory::{
    InMemoryDisbursementStore, InMemoryModuleStore, InMemoryPauseStore,
};
use payroute::infrastructure::simulated_ledger::{SimulatedTokenLedger, TokenTemplate};
use payroute::infrastructure::tracing_audit::TracingAuditSink;
use payroute::interfaces::csv::operation_reader::{Operation, OperationReader};
use payroute::interfaces::csv::request_writer::RequestWriter;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYROUTE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Seconds a pause snapshot is served before it is reloaded
    #[arg(long, env = "PAYROUTE_PAUSE_TTL_SECS", default_value_t = 30)]
    pause_ttl_secs: u64,

    /// Report every scope as paused until pause state has loaded
    #[arg(long, env = "PAYROUTE_FAIL_CLOSED")]
    fail_closed: bool,

    /// Seconds to wait for a routed payment to become final
    #[arg(long, env = "PAYROUTE_FINALITY_TIMEOUT_SECS", default_value_t = 60)]
    finality_timeout_secs: u64,

    /// Decimals of every simulated token
    #[arg(long, env = "PAYROUTE_TOKEN_DECIMALS", default_value_t = 18)]
    token_decimals: u8,

    /// Treasury address of every simulated token
    #[arg(
        long,
        env = "PAYROUTE_TREASURY",
        default_value = "0x7ea5000000000000000000000000000000000000"
    )]
    treasury: String,

    /// Starting treasury balance of every simulated token, in smallest units
    #[arg(long, env = "PAYROUTE_TREASURY_BALANCE", default_value_t = 0)]
    treasury_balance: u128,

    /// Deny the engine minting rights on simulated tokens
    #[arg(long, env = "PAYROUTE_NO_MINT_AUTHORITY")]
    no_mint_authority: bool,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            pause_cache_ttl: Duration::from_secs(self.pause_ttl_secs),
            pause_read_policy: if self.fail_closed {
                PauseReadPolicy::FailClosed
            } else {
                PauseReadPolicy::FailOpen
            },
            finality_timeout: Duration::from_secs(self.finality_timeout_secs),
            ..EngineConfig::default()
        }
    }
}

type Stores = (PauseStoreBox, DisbursementStoreBox, ModuleStoreBox, AuditSinkRef);

fn in_memory_stores() -> Stores {
    (
        Box::new(InMemoryPauseStore::new()),
        Box::new(InMemoryDisbursementStore::new()),
        Box::new(InMemoryModuleStore::new()),
        Arc::new(TracingAuditSink),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&std::path::Path>) -> Result<Stores> {
    use payroute::infrastructure::rocksdb::RocksDBStore;
    use payroute::infrastructure::tracing_audit::FanOutAuditSink;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            info!(path = %path.display(), "using RocksDB storage");
            Ok((
                Box::new(store.clone()),
                Box::new(store.clone()),
                Box::new(store.clone()),
                Arc::new(FanOutAuditSink::new(vec![
                    Arc::new(store),
                    Arc::new(TracingAuditSink),
                ])),
            ))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&std::path::Path>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(in_memory_stores())
}

/// Replay state: request ids by file reference, and tenants to report on.
#[derive(Default)]
struct Replay {
    references: HashMap<String, Uuid>,
    tenants: BTreeSet<String>,
}

impl Replay {
    async fn apply(&mut self, engine: &PaymentEngine, operation: Operation) -> EngineResult<()> {
        match operation {
            Operation::Request {
                actor,
                reference,
                draft,
            } => {
                let request = engine
                    .disbursements()
                    .request_disbursement(draft, &actor)
                    .await?;
                self.tenants.insert(request.tenant_id.clone());
                if let Some(reference) = reference {
                    self.references.insert(reference, request.id);
                }
            }
            Operation::Execute { actor, reference } => {
                let id = match self.references.get(&reference) {
                    Some(id) => *id,
                    None => reference.parse::<Uuid>().map_err(|_| {
                        EngineError::not_found("Disbursement reference", &reference)
                    })?,
                };
                let request = engine.disbursements().execute_disbursement(id, &actor).await?;
                self.tenants.insert(request.tenant_id);
            }
            Operation::SetPause {
                actor,
                scope,
                target,
                paused,
                reason,
            } => {
                engine
                    .pauses()
                    .set_pause(scope, target.as_deref(), paused, &reason, &actor)
                    .await?;
            }
            Operation::EnableModule { actor, draft } => {
                engine.modules().enable_module(draft, &actor).await?;
            }
            Operation::Send { actor, payment } => {
                let receipt = engine.payments().send_payment(payment, &actor).await?;
                info!(tx_hash = %receipt.tx_hash, "direct payment settled");
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "payroute=info".into()),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config();

    let ledger = SimulatedTokenLedger::with_template(TokenTemplate {
        decimals: cli.token_decimals,
        treasury: Address::parse(&cli.treasury).into_diagnostic()?,
        treasury_balance: cli.treasury_balance,
        mint_authority: !cli.no_mint_authority,
    });

    let (pause_store, disbursement_store, module_store, audit) =
        open_stores(cli.db_path.as_deref())?;
    let engine = PaymentEngine::new(
        pause_store,
        disbursement_store,
        module_store,
        audit,
        Arc::new(ledger),
        &config,
    );
    engine.start().await.into_diagnostic()?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let mut replay = Replay::default();
    for (index, operation) in reader.operations().enumerate() {
        let row = index + 1;
        match operation {
            Ok(operation) => {
                let actor = operation.actor().id.clone();
                if let Err(e) = replay.apply(&engine, operation).await {
                    warn!(row, %actor, error = %e, "Operation rejected");
                }
            }
            Err(e) => {
                warn!(row, error = %e, "Error reading operation");
            }
        }
    }

    let mut requests = Vec::new();
    for tenant in &replay.tenants {
        requests.extend(
            engine
                .disbursements()
                .list_requests(tenant, None)
                .await
                .into_diagnostic()?,
        );
    }

    let stdout = io::stdout();
    let mut writer = RequestWriter::new(stdout.lock());
    writer.write_requests(&requests).into_diagnostic()?;

    Ok(())
}
