use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account or contract address in `0x`-prefixed hex.
///
/// Stored lowercased so that comparisons and pause lookups are case-insensitive.
/// Checksum casing is not verified here; that belongs to the wallet layer in front
/// of the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| {
                EngineError::ValidationError(format!("address '{value}' must start with 0x"))
            })?;

        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::ValidationError(format!(
                "address '{value}' must be 40 hex digits"
            )));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an amount literal should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountUnit {
    /// Human-readable token units, scaled by `10^decimals`.
    Decimal,
    /// Already expressed in the token's smallest unit.
    SmallestUnit,
    /// A literal with a decimal point is `Decimal`, anything else is `SmallestUnit`.
    #[default]
    Inferred,
}

/// A positive amount in a token's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub fn new(units: u128) -> Result<Self> {
        if units > 0 {
            Ok(Self(units))
        } else {
            Err(EngineError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    /// Parses an amount literal for a token with `decimals` fractional digits.
    pub fn parse(literal: &str, unit: AmountUnit, decimals: u8) -> Result<Self> {
        let literal = literal.trim();
        let unit = match unit {
            AmountUnit::Inferred if literal.contains('.') => AmountUnit::Decimal,
            AmountUnit::Inferred => AmountUnit::SmallestUnit,
            explicit => explicit,
        };

        match unit {
            AmountUnit::SmallestUnit => {
                let units = literal.parse::<u128>().map_err(|e| {
                    EngineError::ValidationError(format!("invalid amount '{literal}': {e}"))
                })?;
                Self::new(units)
            }
            _ => {
                let value = Decimal::from_str_exact(literal).map_err(|e| {
                    EngineError::ValidationError(format!("invalid amount '{literal}': {e}"))
                })?;
                Self::from_decimal(value, decimals)
            }
        }
    }

    /// Scales a token-unit decimal by `10^decimals`.
    pub fn from_decimal(value: Decimal, decimals: u8) -> Result<Self> {
        let value = value.normalize();
        if value <= Decimal::ZERO {
            return Err(EngineError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }

        let scale = value.scale();
        let decimals = u32::from(decimals);
        if scale > decimals {
            return Err(EngineError::ValidationError(format!(
                "amount {value} has more than {decimals} fractional digits"
            )));
        }

        let overflow =
            || EngineError::ValidationError(format!("amount {value} overflows at {decimals} decimals"));
        let mantissa = u128::try_from(value.mantissa()).map_err(|_| overflow())?;
        let factor = 10u128.checked_pow(decimals - scale).ok_or_else(overflow)?;
        let units = mantissa.checked_mul(factor).ok_or_else(overflow)?;
        Self::new(units)
    }

    pub fn units(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value, AmountUnit::SmallestUnit, 0)
    }
}

impl From<TokenAmount> for String {
    fn from(amount: TokenAmount) -> Self {
        amount.0.to_string()
    }
}

impl From<TokenAmount> for u128 {
    fn from(amount: TokenAmount) -> Self {
        amount.0
    }
}
