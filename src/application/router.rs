use crate::config::EngineConfig;
use crate::domain::amount::{Address, AmountUnit, TokenAmount};
use crate::domain::ports::TokenLedgerRef;
use crate::domain::receipt::PaymentReceipt;
use crate::error::{LedgerError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Decimals value that callers pass when they do not actually know the token's
/// decimals. Seeing it makes the router ask the token instead.
pub const DECIMALS_SENTINEL: u8 = 18;

/// Decides how a payment is funded and submits exactly one ledger mutation.
///
/// If the treasury holds enough of the token the payment is a transfer;
/// otherwise the router mints to the recipient, and if minting is refused it
/// tries the transfer anyway so the caller gets the ledger's own error.
pub struct PaymentRouter {
    ledger: TokenLedgerRef,
    default_decimals: u8,
    finality_timeout: Duration,
    token_locks: Option<Mutex<HashMap<Address, Arc<Mutex<()>>>>>,
}

impl PaymentRouter {
    pub fn new(ledger: TokenLedgerRef, config: &EngineConfig) -> Self {
        Self {
            ledger,
            default_decimals: config.default_decimals,
            finality_timeout: config.finality_timeout,
            token_locks: config
                .serialize_routing_per_token
                .then(|| Mutex::new(HashMap::new())),
        }
    }

    /// Routes `amount`, reading a literal with a decimal point as token units
    /// and anything else as smallest units.
    pub async fn route(
        &self,
        token: &Address,
        to: &Address,
        amount: &str,
        decimals: Option<u8>,
    ) -> Result<PaymentReceipt> {
        self.route_with_unit(token, to, amount, AmountUnit::Inferred, decimals)
            .await
    }

    pub async fn route_with_unit(
        &self,
        token: &Address,
        to: &Address,
        amount: &str,
        unit: AmountUnit,
        decimals: Option<u8>,
    ) -> Result<PaymentReceipt> {
        let decimals = self.resolve_decimals(token, decimals).await;
        let amount = TokenAmount::parse(amount, unit, decimals)?;

        let Some(locks) = &self.token_locks else {
            return self.fund(token, to, amount).await;
        };

        let lock = locks.lock().await.entry(token.clone()).or_default().clone();
        let result = {
            let _serialized = lock.lock().await;
            self.fund(token, to, amount).await
        };

        // Drop the entry once no other payment of this token holds or waits on it.
        let mut locks = locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(token);
        }
        result
    }

    async fn fund(
        &self,
        token: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<PaymentReceipt> {
        let treasury = self.ledger.treasury(token).await?;
        let balance = self.ledger.balance_of(token, &treasury).await?;

        let pending = if balance >= amount.units() {
            info!(%token, %to, %amount, "treasury balance sufficient, transferring");
            self.ledger.transfer(token, to, amount).await?
        } else {
            info!(%token, %to, %amount, balance, "treasury balance insufficient, minting");
            match self.ledger.mint(token, to, amount).await {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(%token, error = %e, "minting failed, trying transfer anyway");
                    self.ledger.transfer(token, to, amount).await?
                }
            }
        };

        let tx_hash = pending.tx_hash.clone();
        let receipt = tokio::time::timeout(
            self.finality_timeout,
            self.ledger.wait_for_finality(pending),
        )
        .await
        .map_err(|_| LedgerError::FinalityTimeout {
            tx_hash,
            timeout: self.finality_timeout,
        })??;

        info!(
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            source = %receipt.source,
            "payment final"
        );
        Ok(receipt)
    }

    /// Caller-supplied decimals win unless missing or equal to the sentinel, in
    /// which case the token is asked. A failed lookup falls back to the caller's
    /// value, then to the configured default.
    pub async fn resolve_decimals(&self, token: &Address, requested: Option<u8>) -> u8 {
        match requested {
            Some(decimals) if decimals != DECIMALS_SENTINEL => decimals,
            _ => match self.ledger.decimals(token).await {
                Ok(decimals) => decimals,
                Err(e) => {
                    let fallback = requested.unwrap_or(self.default_decimals);
                    warn!(%token, error = %e, fallback, "decimals lookup failed");
                    fallback
                }
            },
        }
    }

    /// The token's own decimals, if the ledger will say.
    pub async fn token_decimals(&self, token: &Address) -> Option<u8> {
        match self.ledger.decimals(token).await {
            Ok(decimals) => Some(decimals),
            Err(e) => {
                warn!(%token, error = %e, "decimals lookup failed");
                None
            }
        }
    }

    pub async fn balance_of(&self, token: &Address, owner: &Address) -> Result<u128> {
        Ok(self.ledger.balance_of(token, owner).await?)
    }

    pub fn default_decimals(&self) -> u8 {
        self.default_decimals
    }

    #[cfg(test)]
    async fn tracked_tokens(&self) -> usize {
        match &self.token_locks {
            Some(locks) => locks.lock().await.len(),
            None => 0,
        }
    }
}
