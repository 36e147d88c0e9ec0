//! Wallet Records
//!
//! The one entity the dashboard deals with: a user's wallet, stored as a
//! document keyed by the owner's linked messaging id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::store::{Document, FieldValue, Fields};

/// Stored field names
pub mod fields {
    pub const OWNER: &str = "propietario";
    pub const LINKED_ID: &str = "telegram_id";
    pub const BALANCE: &str = "fc_balance";
    pub const TIER: &str = "nivel";
    pub const PARENT: &str = "parent_admin";
    pub const MONTHLY_REVENUE: &str = "ingresos_mes";
    pub const CREATED_AT: &str = "fecha_creacion";
}

/// Tier given to freshly created wallets
pub const DEFAULT_TIER: &str = "Sembrador";

/// A numeric amount as stored: whole or fractional
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Amount {
    Integer(i64),
    Decimal(f64),
}

impl Amount {
    pub const ZERO: Amount = Amount::Integer(0);

    /// Read an amount from an optional field
    ///
    /// Absent, null and non-numeric values count as zero. Numeric strings are
    /// accepted since external writers sometimes store them that way.
    pub fn from_field(value: Option<&FieldValue>) -> Self {
        match value {
            Some(FieldValue::Integer(i)) => Amount::Integer(*i),
            Some(FieldValue::Double(d)) if d.is_finite() => Amount::Decimal(*d),
            Some(FieldValue::String(s)) => Self::parse(s).unwrap_or(Amount::ZERO),
            Some(FieldValue::Null) | None => Amount::ZERO,
            Some(other) => {
                tracing::debug!(value = ?other, "Non-numeric amount treated as zero");
                Amount::ZERO
            }
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Some(Amount::Integer(i));
        }
        text.parse::<f64>()
            .ok()
            .filter(|d| d.is_finite())
            .map(Amount::Decimal)
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Amount::Integer(i) => *i as f64,
            Amount::Decimal(d) => *d,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::ZERO
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Integer(i) => write!(f, "{}", i),
            Amount::Decimal(d) => write!(f, "{}", d),
        }
    }
}

impl From<Amount> for FieldValue {
    fn from(amount: Amount) -> Self {
        match amount {
            Amount::Integer(i) => FieldValue::Integer(i),
            Amount::Decimal(d) => FieldValue::Double(d),
        }
    }
}

/// Typed view of a stored wallet document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletRecord {
    pub key: String,
    pub owner: Option<String>,
    pub linked_id: Option<String>,
    pub balance: Amount,
    pub tier: Option<String>,
    pub parent_key: Option<String>,
    pub monthly_revenue: Amount,
    pub created_at: Option<DateTime<Utc>>,
}

impl WalletRecord {
    pub fn from_document(document: &Document) -> Self {
        let text = |name: &str| {
            document
                .get(name)
                .and_then(FieldValue::as_str)
                .map(str::to_string)
        };

        Self {
            key: document.path.key().to_string(),
            owner: text(fields::OWNER),
            linked_id: text(fields::LINKED_ID),
            balance: Amount::from_field(document.get(fields::BALANCE)),
            tier: text(fields::TIER),
            parent_key: text(fields::PARENT),
            monthly_revenue: Amount::from_field(document.get(fields::MONTHLY_REVENUE)),
            created_at: document
                .get(fields::CREATED_AT)
                .and_then(FieldValue::as_timestamp),
        }
    }
}

/// Fields written when a wallet is created
#[derive(Debug, Clone, PartialEq)]
pub struct NewWallet {
    pub owner_name: String,
    pub linked_id: String,
    pub tier: String,
    pub parent_key: String,
}

impl NewWallet {
    /// Wallet with zero balance and the default tier
    pub fn new(
        owner_name: impl Into<String>,
        linked_id: impl Into<String>,
        parent_key: impl Into<String>,
    ) -> Self {
        Self {
            owner_name: owner_name.into(),
            linked_id: linked_id.into(),
            tier: DEFAULT_TIER.to_string(),
            parent_key: parent_key.into(),
        }
    }

    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    /// Document fields; the creation time is left for the store to assign
    pub fn into_fields(self) -> Fields {
        let mut out = Fields::new();
        out.insert(fields::OWNER.to_string(), FieldValue::String(self.owner_name));
        out.insert(fields::LINKED_ID.to_string(), FieldValue::String(self.linked_id));
        out.insert(fields::BALANCE.to_string(), Amount::ZERO.into());
        out.insert(fields::TIER.to_string(), FieldValue::String(self.tier));
        out.insert(fields::PARENT.to_string(), FieldValue::String(self.parent_key));
        out.insert(fields::CREATED_AT.to_string(), FieldValue::ServerTimestamp);
        out
    }
}
