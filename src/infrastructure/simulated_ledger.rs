use crate::domain::amount::{Address, TokenAmount};
use crate::domain::ports::TokenLedger;
use crate::domain::receipt::{FundingSource, PaymentReceipt, PendingTransaction};
use crate::error::LedgerError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TokenState {
    decimals: u8,
    treasury: Address,
    mint_authority: bool,
    balances: HashMap<Address, u128>,
}

/// Parameters for tokens created on first use.
#[derive(Debug, Clone)]
pub struct TokenTemplate {
    pub decimals: u8,
    pub treasury: Address,
    pub treasury_balance: u128,
    pub mint_authority: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    tokens: HashMap<Address, TokenState>,
    template: Option<TokenTemplate>,
    block_number: u64,
    decimals_unavailable: bool,
    revert_next: Option<String>,
    submitted: Vec<PendingTransaction>,
}

/// An in-process token ledger.
///
/// Balances change when a mutation is submitted; `wait_for_finality` only assigns
/// a block number after the configured delay. Used by the CLI and by tests in
/// place of a chain client.
#[derive(Clone, Default)]
pub struct SimulatedTokenLedger {
    state: Arc<Mutex<LedgerState>>,
    finality_delay: Duration,
}

impl SimulatedTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown tokens are created from `template` instead of failing.
    pub fn with_template(template: TokenTemplate) -> Self {
        let ledger = Self::new();
        ledger.lock().template = Some(template);
        ledger
    }

    pub fn with_finality_delay(mut self, delay: Duration) -> Self {
        self.finality_delay = delay;
        self
    }

    pub fn register_token(
        &self,
        token: &Address,
        decimals: u8,
        treasury: &Address,
        treasury_balance: u128,
    ) {
        let mut balances = HashMap::new();
        balances.insert(treasury.clone(), treasury_balance);
        self.lock().tokens.insert(
            token.clone(),
            TokenState {
                decimals,
                treasury: treasury.clone(),
                mint_authority: true,
                balances,
            },
        );
    }

    pub fn set_mint_authority(&self, token: &Address, granted: bool) {
        if let Some(state) = self.lock().tokens.get_mut(token) {
            state.mint_authority = granted;
        }
    }

    /// Makes every `decimals()` call fail until turned off again.
    pub fn set_decimals_unavailable(&self, unavailable: bool) {
        self.lock().decimals_unavailable = unavailable;
    }

    /// The next transfer or mint reverts with `reason`.
    pub fn revert_next(&self, reason: impl Into<String>) {
        self.lock().revert_next = Some(reason.into());
    }

    pub fn balance(&self, token: &Address, owner: &Address) -> u128 {
        self.lock()
            .tokens
            .get(token)
            .and_then(|t| t.balances.get(owner).copied())
            .unwrap_or(0)
    }

    /// Every mutation submitted so far, in order.
    pub fn submitted(&self) -> Vec<PendingTransaction> {
        self.lock().submitted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(
        &self,
        token: &Address,
        to: &Address,
        amount: TokenAmount,
        source: FundingSource,
    ) -> Result<PendingTransaction, LedgerError> {
        let mut state = self.lock();
        if let Some(reason) = state.revert_next.take() {
            return Err(LedgerError::Reverted(reason));
        }

        let token_state = token_entry(&mut state, token)?;
        let treasury = token_state.treasury.clone();
        let units = amount.units();

        match source {
            FundingSource::Transfer => {
                let available = token_state.balances.get(&treasury).copied().unwrap_or(0);
                if available < units {
                    return Err(LedgerError::InsufficientBalance {
                        available,
                        requested: units,
                    });
                }
                token_state.balances.insert(treasury.clone(), available - units);
            }
            FundingSource::Mint => {
                if !token_state.mint_authority {
                    return Err(LedgerError::MintUnauthorized {
                        token: token.to_string(),
                    });
                }
            }
        }

        let credited = token_state.balances.entry(to.clone()).or_insert(0);
        *credited = credited.saturating_add(units);

        let pending = PendingTransaction {
            tx_hash: format!("0x{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            source,
            from: treasury,
            to: to.clone(),
            amount,
        };
        state.submitted.push(pending.clone());
        Ok(pending)
    }
}

fn token_entry<'a>(
    state: &'a mut LedgerState,
    token: &Address,
) -> Result<&'a mut TokenState, LedgerError> {
    if !state.tokens.contains_key(token) {
        let template = state
            .template
            .clone()
            .ok_or_else(|| LedgerError::UnknownToken(token.to_string()))?;
        let mut balances = HashMap::new();
        balances.insert(template.treasury.clone(), template.treasury_balance);
        state.tokens.insert(
            token.clone(),
            TokenState {
                decimals: template.decimals,
                treasury: template.treasury,
                mint_authority: template.mint_authority,
                balances,
            },
        );
    }
    state
        .tokens
        .get_mut(token)
        .ok_or_else(|| LedgerError::UnknownToken(token.to_string()))
}

#[async_trait]
impl TokenLedger for SimulatedTokenLedger {
    async fn decimals(&self, token: &Address) -> Result<u8, LedgerError> {
        let mut state = self.lock();
        if state.decimals_unavailable {
            return Err(LedgerError::Network("decimals() call failed".to_string()));
        }
        Ok(token_entry(&mut state, token)?.decimals)
    }

    async fn treasury(&self, token: &Address) -> Result<Address, LedgerError> {
        let mut state = self.lock();
        Ok(token_entry(&mut state, token)?.treasury.clone())
    }

    async fn balance_of(&self, token: &Address, owner: &Address) -> Result<u128, LedgerError> {
        let mut state = self.lock();
        let token_state = token_entry(&mut state, token)?;
        Ok(token_state.balances.get(owner).copied().unwrap_or(0))
    }

    async fn transfer(
        &self,
        token: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<PendingTransaction, LedgerError> {
        self.submit(token, to, amount, FundingSource::Transfer)
    }

    async fn mint(
        &self,
        token: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> Result<PendingTransaction, LedgerError> {
        self.submit(token, to, amount, FundingSource::Mint)
    }

    async fn wait_for_finality(
        &self,
        pending: PendingTransaction,
    ) -> Result<PaymentReceipt, LedgerError> {
        if !self.finality_delay.is_zero() {
            tokio::time::sleep(self.finality_delay).await;
        }
        let block_number = {
            let mut state = self.lock();
            state.block_number += 1;
            state.block_number
        };
        Ok(PaymentReceipt {
            tx_hash: pending.tx_hash,
            from: pending.from,
            to: pending.to,
            amount: pending.amount,
            block_number,
            source: pending.source,
        })
    }
}
