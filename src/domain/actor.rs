use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Roles an authenticated caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "TREASURY")]
    Treasury,
    #[serde(rename = "PROGRAM")]
    Program,
    #[serde(rename = "COMPLIANCE")]
    Compliance,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Treasury => "TREASURY",
            Role::Program => "PROGRAM",
            Role::Compliance => "COMPLIANCE",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "TREASURY" => Ok(Role::Treasury),
            "PROGRAM" => Ok(Role::Program),
            "COMPLIANCE" => Ok(Role::Compliance),
            other => Err(EngineError::ValidationError(format!("unknown role '{other}'"))),
        }
    }
}

/// Gated operations of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RequestDisbursement,
    ExecuteDisbursement,
    SendPayment,
    ManagePause,
    ManageModules,
}

impl Capability {
    /// Whether `role` grants this capability. Every pair is spelled out so adding a
    /// role or capability forces a decision here.
    pub fn granted_by(self, role: Role) -> bool {
        match (self, role) {
            (_, Role::Admin) => true,
            (Capability::RequestDisbursement, Role::Program) => true,
            (Capability::RequestDisbursement, Role::Treasury | Role::Compliance) => false,
            (Capability::ExecuteDisbursement, Role::Treasury) => true,
            (Capability::ExecuteDisbursement, Role::Program | Role::Compliance) => false,
            (Capability::SendPayment, Role::Treasury) => true,
            (Capability::SendPayment, Role::Program | Role::Compliance) => false,
            (Capability::ManagePause, Role::Compliance) => true,
            (Capability::ManagePause, Role::Treasury | Role::Program) => false,
            (Capability::ManageModules, Role::Treasury) => true,
            (Capability::ManageModules, Role::Program | Role::Compliance) => false,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::RequestDisbursement => "request disbursements",
            Capability::ExecuteDisbursement => "execute disbursements",
            Capability::SendPayment => "send payments",
            Capability::ManagePause => "manage pauses",
            Capability::ManageModules => "manage payment modules",
        };
        f.write_str(s)
    }
}

/// A verified caller identity, as handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub tenant_id: String,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.roles.iter().any(|role| capability.granted_by(*role))
    }

    pub fn authorize(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(EngineError::AuthorizationError {
                actor: self.id.clone(),
                capability: capability.to_string(),
            })
        }
    }

    /// Non-admin actors only act on their own tenant's records.
    pub fn authorize_tenant(&self, tenant_id: &str) -> Result<()> {
        if self.is_admin() || self.tenant_id == tenant_id {
            Ok(())
        } else {
            Err(EngineError::AuthorizationError {
                actor: self.id.clone(),
                capability: format!("access tenant {tenant_id}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("treasury".parse::<Role>().unwrap(), Role::Treasury);
        assert_eq!(" PROGRAM ".parse::<Role>().unwrap(), Role::Program);
        assert!(matches!(
            "auditor".parse::<Role>(),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_role_separation() {
        let program = Actor::new("p1", "t1", [Role::Program]);
        let treasury = Actor::new("tr1", "t1", [Role::Treasury]);

        assert!(program.authorize(Capability::RequestDisbursement).is_ok());
        assert!(matches!(
            program.authorize(Capability::ExecuteDisbursement),
            Err(EngineError::AuthorizationError { .. })
        ));

        assert!(treasury.authorize(Capability::ExecuteDisbursement).is_ok());
        assert!(treasury.authorize(Capability::RequestDisbursement).is_err());
    }

    #[test]
    fn test_admin_holds_every_capability() {
        let admin = Actor::new("a1", "t1", [Role::Admin]);
        for cap in [
            Capability::RequestDisbursement,
            Capability::ExecuteDisbursement,
            Capability::SendPayment,
            Capability::ManagePause,
            Capability::ManageModules,
        ] {
            assert!(admin.can(cap), "admin should be able to {cap}");
        }
    }

    #[test]
    fn test_compliance_manages_pauses_only() {
        let compliance = Actor::new("c1", "t1", [Role::Compliance]);
        assert!(compliance.can(Capability::ManagePause));
        assert!(!compliance.can(Capability::SendPayment));
        assert!(!compliance.can(Capability::RequestDisbursement));
        assert!(!compliance.can(Capability::ManageModules));
    }

    #[test]
    fn test_tenant_isolation() {
        let treasury = Actor::new("tr1", "t1", [Role::Treasury]);
        assert!(treasury.authorize_tenant("t1").is_ok());
        assert!(treasury.authorize_tenant("t2").is_err());

        let admin = Actor::new("a1", "t1", [Role::Admin]);
        assert!(admin.authorize_tenant("t2").is_ok());
    }
}
