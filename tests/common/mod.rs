#![allow(dead_code)]

use payroute::application::engine::PaymentEngine;
use payroute::config::EngineConfig;
use payroute::domain::actor::{Actor, Role};
use payroute::domain::amount::Address;
use payroute::domain::clock::{ClockRef, SystemClock};
use payroute::domain::disbursement::DisbursementDraft;
use payroute::infrastructure::in_memory::{
    InMemoryAuditSink, InMemoryDisbursementStore, InMemoryModuleStore, InMemoryPauseStore,
};
use payroute::infrastructure::simulated_ledger::SimulatedTokenLedger;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

pub const TOKEN: &str = "0x0101010101010101010101010101010101010101";
pub const OTHER_TOKEN: &str = "0x0202020202020202020202020202020202020202";
pub const TREASURY: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const RECIPIENT: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

pub const OPERATIONS_HEADER: [&str; 11] = [
    "op",
    "actor",
    "roles",
    "tenant",
    "reference",
    "token",
    "recipient",
    "amount",
    "scope",
    "target",
    "reason",
];

pub fn addr(value: &str) -> Address {
    Address::parse(value).unwrap()
}

/// Everything a test needs to drive an engine and look behind it.
pub struct Harness {
    pub engine: Arc<PaymentEngine>,
    pub ledger: SimulatedTokenLedger,
    pub pause_store: InMemoryPauseStore,
    pub requests: InMemoryDisbursementStore,
    pub modules: InMemoryModuleStore,
    pub audit: InMemoryAuditSink,
}

impl Harness {
    pub fn new(treasury_balance: u128) -> Self {
        Self::build(
            SimulatedTokenLedger::new(),
            treasury_balance,
            InMemoryPauseStore::new(),
            &EngineConfig::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn build(
        ledger: SimulatedTokenLedger,
        treasury_balance: u128,
        pause_store: InMemoryPauseStore,
        config: &EngineConfig,
        clock: ClockRef,
    ) -> Self {
        for token in [TOKEN, OTHER_TOKEN] {
            ledger.register_token(&addr(token), 18, &addr(TREASURY), treasury_balance);
        }
        let requests = InMemoryDisbursementStore::new();
        let modules = InMemoryModuleStore::new();
        let audit = InMemoryAuditSink::new();
        let engine = PaymentEngine::with_clock(
            Box::new(pause_store.clone()),
            Box::new(requests.clone()),
            Box::new(modules.clone()),
            Arc::new(audit.clone()),
            Arc::new(ledger.clone()),
            config,
            clock,
        );
        Self {
            engine: Arc::new(engine),
            ledger,
            pause_store,
            requests,
            modules,
            audit,
        }
    }
}

pub fn program(tenant: &str) -> Actor {
    Actor::new(format!("program-{tenant}"), tenant, [Role::Program])
}

pub fn treasury(tenant: &str) -> Actor {
    Actor::new(format!("treasury-{tenant}"), tenant, [Role::Treasury])
}

pub fn admin() -> Actor {
    Actor::new("admin", "platform", [Role::Admin])
}

pub fn draft(tenant: &str, token: &str, amount: &str) -> DisbursementDraft {
    DisbursementDraft {
        tenant_id: tenant.to_string(),
        amount: amount.to_string(),
        token_address: token.to_string(),
        recipient_address: RECIPIENT.to_string(),
        reason: "stipend".to_string(),
    }
}

/// Writes an operations file that requests and then executes `rows`
/// disbursements of one token unit each for tenant `acme`.
pub fn generate_operations_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record(OPERATIONS_HEADER)?;

    for i in 1..=rows {
        let reference = format!("r{i}");
        wtr.write_record([
            "request",
            "program-acme",
            "PROGRAM",
            "acme",
            &reference,
            TOKEN,
            RECIPIENT,
            "1.0",
            "",
            "",
            "generated",
        ])?;
        wtr.write_record(["execute", "treasury-acme", "TREASURY", "acme", &reference])?;
    }

    wtr.flush()?;
    Ok(())
}
