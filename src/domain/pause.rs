use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target id used for the single GLOBAL pause row.
pub const GLOBAL_TARGET: &str = "ALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PauseScope {
    Global,
    Module,
    Token,
}

impl fmt::Display for PauseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PauseScope::Global => "GLOBAL",
            PauseScope::Module => "MODULE",
            PauseScope::Token => "TOKEN",
        };
        f.write_str(s)
    }
}

impl FromStr for PauseScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GLOBAL" => Ok(PauseScope::Global),
            "MODULE" => Ok(PauseScope::Module),
            "TOKEN" => Ok(PauseScope::Token),
            other => Err(EngineError::ValidationError(format!(
                "Invalid scope '{other}'. Must be GLOBAL, MODULE, or TOKEN."
            ))),
        }
    }
}

/// Storage key of a pause row. Construct through [`PauseKey::new`] so the target
/// is normalized the same way on every path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PauseKey {
    pub scope: PauseScope,
    pub target_id: String,
}

impl PauseKey {
    pub fn new(scope: PauseScope, target_id: Option<&str>) -> Self {
        let target_id = match scope {
            PauseScope::Global => GLOBAL_TARGET.to_string(),
            PauseScope::Module => target_id
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(GLOBAL_TARGET)
                .to_string(),
            PauseScope::Token => target_id
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(GLOBAL_TARGET)
                .to_ascii_lowercase(),
        };
        Self { scope, target_id }
    }

    pub fn global() -> Self {
        Self::new(PauseScope::Global, None)
    }
}

impl fmt::Display for PauseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.target_id)
    }
}

/// A persisted circuit-breaker row. At most one exists per [`PauseKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    pub scope: PauseScope,
    pub target_id: String,
    pub is_paused: bool,
    pub reason: String,
    pub set_by: String,
    pub updated_at: DateTime<Utc>,
}

impl PauseState {
    pub fn key(&self) -> PauseKey {
        PauseKey::new(self.scope, Some(&self.target_id))
    }
}
