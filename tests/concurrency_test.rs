mod common;

use common::{Harness, TOKEN, draft, program, treasury};
use payroute::config::EngineConfig;
use payroute::domain::clock::SystemClock;
use payroute::domain::disbursement::DisbursementStatus;
use payroute::error::EngineError;
use payroute::infrastructure::in_memory::InMemoryPauseStore;
use payroute::infrastructure::simulated_ledger::SimulatedTokenLedger;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executes_move_funds_once() {
    let harness = Harness::build(
        SimulatedTokenLedger::new().with_finality_delay(Duration::from_millis(20)),
        1_000,
        InMemoryPauseStore::new(),
        &EngineConfig::default(),
        Arc::new(SystemClock),
    );
    let request = harness
        .engine
        .disbursements()
        .request_disbursement(draft("acme", TOKEN, "100"), &program("acme"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = harness.engine.clone();
        let id = request.id;
        handles.push(tokio::spawn(async move {
            engine
                .disbursements()
                .execute_disbursement(id, &treasury("acme"))
                .await
        }));
    }

    let mut executed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(request) => {
                assert_eq!(request.status, DisbursementStatus::Executed);
                executed += 1;
            }
            Err(EngineError::InvalidStateError { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(executed, 1);
    assert_eq!(harness.ledger.submitted().len(), 1);
    let stored = harness
        .engine
        .disbursements()
        .get_request(request.id)
        .await
        .unwrap();
    assert_eq!(stored.status, DisbursementStatus::Executed);
    assert!(stored.blockchain_tx_hash.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_routes_on_one_token_never_overdraw() {
    // Enough treasury for exactly five of the ten payments
    let harness = Harness::new(500);

    let mut ids = Vec::new();
    for _ in 0..10 {
        let request = harness
            .engine
            .disbursements()
            .request_disbursement(draft("acme", TOKEN, "100"), &program("acme"))
            .await
            .unwrap();
        ids.push(request.id);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let engine = harness.engine.clone();
            tokio::spawn(async move {
                engine
                    .disbursements()
                    .execute_disbursement(id, &treasury("acme"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let submitted = harness.ledger.submitted();
    assert_eq!(submitted.len(), 10);
    let transfers = submitted
        .iter()
        .filter(|tx| tx.source == payroute::domain::receipt::FundingSource::Transfer)
        .count();
    assert_eq!(transfers, 5);
    assert_eq!(
        harness
            .ledger
            .balance(&common::addr(TOKEN), &common::addr(common::TREASURY)),
        0
    );
}
