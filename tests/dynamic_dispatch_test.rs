use chrono::Utc;
use payroute::domain::amount::{Address, TokenAmount};
use payroute::domain::disbursement::DisbursementRequest;
use payroute::domain::pause::{PauseKey, PauseScope, PauseState};
use payroute::domain::ports::{DisbursementStoreBox, PauseStoreBox, TokenLedgerRef};
use payroute::infrastructure::in_memory::{InMemoryDisbursementStore, InMemoryPauseStore};
use payroute::infrastructure::simulated_ledger::SimulatedTokenLedger;
use std::sync::Arc;

fn addr(byte: &str) -> Address {
    Address::parse(&format!("0x{}", byte.repeat(20))).unwrap()
}

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let pause_store: PauseStoreBox = Box::new(InMemoryPauseStore::new());
    let request_store: DisbursementStoreBox = Box::new(InMemoryDisbursementStore::new());
    let ledger = SimulatedTokenLedger::new();
    ledger.register_token(&addr("01"), 6, &addr("aa"), 10);
    let ledger: TokenLedgerRef = Arc::new(ledger);

    let request = DisbursementRequest::pending(
        "t1".to_string(),
        "1".to_string(),
        addr("01"),
        addr("bb"),
        "grant".to_string(),
        "p1".to_string(),
        Some(6),
        Utc::now(),
    );
    let id = request.id;

    // Verify Send + Sync by spawning tasks
    let pause_handle = tokio::spawn(async move {
        let key = PauseKey::new(PauseScope::Token, Some("0xABC"));
        pause_store
            .upsert(PauseState {
                scope: key.scope,
                target_id: key.target_id.clone(),
                is_paused: true,
                reason: "test".to_string(),
                set_by: "admin".to_string(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        pause_store.get(&key).await.unwrap().unwrap()
    });

    let request_handle = tokio::spawn(async move {
        request_store.insert(request).await.unwrap();
        request_store.get(id).await.unwrap().unwrap()
    });

    let ledger_handle = tokio::spawn(async move {
        let pending = ledger
            .transfer(&addr("01"), &addr("bb"), TokenAmount::new(4).unwrap())
            .await
            .unwrap();
        ledger.wait_for_finality(pending).await.unwrap()
    });

    let pause = pause_handle.await.unwrap();
    assert_eq!(pause.target_id, "0xabc");

    let stored = request_handle.await.unwrap();
    assert_eq!(stored.id, id);

    let receipt = ledger_handle.await.unwrap();
    assert_eq!(receipt.amount.units(), 4);
}
