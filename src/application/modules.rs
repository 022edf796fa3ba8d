use super::record_audit;
use super::router::PaymentRouter;
use crate::domain::actor::{Actor, Capability};
use crate::domain::amount::Address;
use crate::domain::audit::{AuditAction, AuditRecord, AuditResource};
use crate::domain::clock::ClockRef;
use crate::domain::module::{ModuleDraft, PaymentModule};
use crate::domain::ports::{AuditSinkRef, ModuleStoreBox};
use crate::error::{EngineError, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Registry of payment modules attached to existing token contracts.
pub struct ModuleRegistry {
    store: ModuleStoreBox,
    router: Arc<PaymentRouter>,
    audit: AuditSinkRef,
    clock: ClockRef,
}

impl ModuleRegistry {
    pub fn new(
        store: ModuleStoreBox,
        router: Arc<PaymentRouter>,
        audit: AuditSinkRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            store,
            router,
            audit,
            clock,
        }
    }

    /// Attaches a module to `draft.token_address`. Decimals not given by the
    /// caller are read from the token once and kept on the module.
    pub async fn enable_module(&self, draft: ModuleDraft, actor: &Actor) -> Result<PaymentModule> {
        actor.authorize(Capability::ManageModules)?;
        actor.authorize_tenant(&draft.tenant_id)?;

        if draft.tenant_id.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "a payment module needs a tenant".to_string(),
            ));
        }
        let token_address = Address::parse(&draft.token_address)?;
        let module_id = match draft.module_id.as_deref().map(str::trim) {
            Some("") | None => Uuid::new_v4().to_string(),
            Some(id) => id.to_string(),
        };
        let token_decimals = match draft.token_decimals {
            Some(decimals) => Some(decimals),
            None => self.router.token_decimals(&token_address).await,
        };

        let module = PaymentModule {
            module_id,
            tenant_id: draft.tenant_id,
            token_address,
            token_decimals,
            enabled_by: actor.id.clone(),
            created_at: self.clock.now(),
        };
        self.store.insert(module.clone()).await?;

        info!(
            module_id = %module.module_id,
            tenant = %module.tenant_id,
            token = %module.token_address,
            "payment module enabled"
        );
        record_audit(
            &self.audit,
            AuditRecord::new(
                AuditAction::ModuleEnable,
                AuditResource::Module,
                json!({
                    "module_id": module.module_id,
                    "token_address": module.token_address,
                    "token_decimals": module.token_decimals,
                    "mode": "ATTACH",
                }),
                module.created_at,
            )
            .by(actor)
            .for_tenant(module.tenant_id.clone()),
        )
        .await;

        Ok(module)
    }

    pub async fn get_module(&self, module_id: &str) -> Result<PaymentModule> {
        self.store
            .get(module_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Payment module", module_id))
    }

    pub async fn list_modules(&self, tenant_id: &str) -> Result<Vec<PaymentModule>> {
        self.store.list_by_tenant(tenant_id).await
    }
}
