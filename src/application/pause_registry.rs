use super::record_audit;
use crate::config::{EngineConfig, PauseReadPolicy};
use crate::domain::actor::{Actor, Capability};
use crate::domain::audit::{AuditAction, AuditRecord, AuditResource};
use crate::domain::clock::ClockRef;
use crate::domain::pause::{PauseKey, PauseScope, PauseState};
use crate::domain::ports::{AuditSinkRef, PauseStoreBox};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

/// In-memory view of the active pause rows.
#[derive(Debug, Default, Clone)]
struct Snapshot {
    global: bool,
    modules: HashSet<String>,
    tokens: HashSet<String>,
    refreshed_at: Option<DateTime<Utc>>,
    // Last reload attempt, successful or not. Staleness is measured from here so
    // a failing store is retried once per TTL rather than on every read.
    attempted_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn from_rows(rows: Vec<PauseState>, at: DateTime<Utc>) -> Self {
        let mut snapshot = Snapshot {
            refreshed_at: Some(at),
            attempted_at: Some(at),
            ..Default::default()
        };
        for row in rows.into_iter().filter(|row| row.is_paused) {
            snapshot.apply(&row.key(), true);
        }
        snapshot
    }

    fn apply(&mut self, key: &PauseKey, paused: bool) {
        let set = match key.scope {
            PauseScope::Global => {
                self.global = paused;
                return;
            }
            PauseScope::Module => &mut self.modules,
            PauseScope::Token => &mut self.tokens,
        };
        if paused {
            set.insert(key.target_id.clone());
        } else {
            set.remove(&key.target_id);
        }
    }

    /// GLOBAL dominates every other scope.
    fn contains(&self, key: &PauseKey) -> bool {
        if self.global {
            return true;
        }
        match key.scope {
            PauseScope::Global => false,
            PauseScope::Module => self.modules.contains(&key.target_id),
            PauseScope::Token => self.tokens.contains(&key.target_id),
        }
    }

    fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.attempted_at {
            Some(at) => now - at > ttl,
            None => true,
        }
    }
}

/// Circuit breaker over GLOBAL, MODULE and TOKEN scopes.
///
/// Reads are served from a snapshot that is reloaded from the [`PauseStore`]
/// once it is older than the configured TTL. Writes go to the store first and
/// then straight into the snapshot, so the writing process sees its own change
/// without waiting for the next reload.
///
/// [`PauseStore`]: crate::domain::ports::PauseStore
pub struct PauseRegistry {
    store: PauseStoreBox,
    audit: AuditSinkRef,
    clock: ClockRef,
    ttl: Duration,
    read_policy: PauseReadPolicy,
    snapshot: RwLock<Snapshot>,
    // Held while reloading or writing, so a reload never overwrites a newer write.
    refresh: Mutex<()>,
}

impl PauseRegistry {
    pub fn new(
        store: PauseStoreBox,
        audit: AuditSinkRef,
        clock: ClockRef,
        config: &EngineConfig,
    ) -> Self {
        let ttl = Duration::from_std(config.pause_cache_ttl).unwrap_or(Duration::seconds(30));
        Self {
            store,
            audit,
            clock,
            ttl,
            read_policy: config.pause_read_policy,
            snapshot: RwLock::new(Snapshot::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Loads the snapshot from storage. Call before serving reads; unlike the
    /// lazy reload on the read path, failures are returned to the caller.
    pub async fn load(&self) -> Result<()> {
        let _guard = self.refresh.lock().await;
        let now = self.clock.now();
        let rows = self.store.active().await?;
        *self.snapshot.write().await = Snapshot::from_rows(rows, now);
        debug!("pause snapshot loaded");
        Ok(())
    }

    /// Whether money movement for `scope`/`target_id` is halted.
    ///
    /// Never fails: a reload error keeps the previous snapshot and is reported
    /// through logs and the audit trail only.
    pub async fn is_paused(&self, scope: PauseScope, target_id: Option<&str>) -> bool {
        self.refresh_if_stale().await;

        let key = PauseKey::new(scope, target_id);
        let snapshot = self.snapshot.read().await;
        if snapshot.refreshed_at.is_none() && self.read_policy == PauseReadPolicy::FailClosed {
            return true;
        }
        snapshot.contains(&key)
    }

    /// Pauses or resumes a scope. Storage is written before the snapshot; if
    /// the write fails nothing changes.
    pub async fn set_pause(
        &self,
        scope: PauseScope,
        target_id: Option<&str>,
        paused: bool,
        reason: &str,
        actor: &Actor,
    ) -> Result<PauseState> {
        actor.authorize(Capability::ManagePause)?;

        let key = PauseKey::new(scope, target_id);
        let state = PauseState {
            scope: key.scope,
            target_id: key.target_id.clone(),
            is_paused: paused,
            reason: reason.to_string(),
            set_by: actor.id.clone(),
            updated_at: self.clock.now(),
        };

        {
            let _guard = self.refresh.lock().await;
            self.store.upsert(state.clone()).await?;
            self.snapshot.write().await.apply(&key, paused);
        }

        info!(%key, paused, actor = %actor.id, reason, "pause state changed");
        record_audit(
            &self.audit,
            AuditRecord::new(
                AuditAction::PauseSet,
                AuditResource::Admin,
                json!({
                    "scope": state.scope,
                    "target_id": state.target_id,
                    "is_paused": paused,
                    "reason": reason,
                }),
                state.updated_at,
            )
            .by(actor)
            .for_tenant(actor.tenant_id.clone()),
        )
        .await;

        Ok(state)
    }

    /// The persisted row for one scope/target, if it was ever set.
    ///
    /// Unlike [`PauseRegistry::is_paused`] this reads storage directly, does not
    /// apply GLOBAL dominance and reports storage errors.
    pub async fn pause_status(
        &self,
        scope: PauseScope,
        target_id: Option<&str>,
    ) -> Result<Option<PauseState>> {
        self.store.get(&PauseKey::new(scope, target_id)).await
    }

    /// Active pause rows as currently persisted.
    pub async fn active_pauses(&self) -> Result<Vec<PauseState>> {
        self.store.active().await
    }

    async fn refresh_if_stale(&self) {
        let now = self.clock.now();
        if !self.snapshot.read().await.is_stale(now, self.ttl) {
            return;
        }

        // Another task is already reloading or writing; serve what we have.
        let Ok(_guard) = self.refresh.try_lock() else {
            return;
        };
        if !self.snapshot.read().await.is_stale(now, self.ttl) {
            return;
        }

        match self.store.active().await {
            Ok(rows) => {
                *self.snapshot.write().await = Snapshot::from_rows(rows, now);
                debug!("pause snapshot refreshed");
            }
            Err(e) => {
                self.snapshot.write().await.attempted_at = Some(now);
                error!(error = %e, "failed to refresh pause snapshot, keeping previous state");
                record_audit(
                    &self.audit,
                    AuditRecord::new(
                        AuditAction::Error,
                        AuditResource::PauseRegistry,
                        json!({ "action": "refresh-cache", "error": e.to_string() }),
                        now,
                    ),
                )
                .await;
            }
        }
    }
}
