//! Data models for ledgerio.
//!
//! Importable dossier entities and the notifications raised when their
//! tables change.

mod account;
mod bank_transaction;
mod class;
mod entity;
mod events;

pub use account::{Account, AccountKind};
pub use bank_transaction::BankTransaction;
pub use class::Class;
pub use entity::ImportEntity;
pub use events::{EventMeta, StoreEvent};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity types that can be imported into a dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Chart-of-accounts entries.
    Account,
    /// Analytic classes.
    Class,
    /// Bank account transaction (BAT) lines.
    #[serde(alias = "bat")]
    BankTransaction,
}

impl EntityType {
    /// Returns all entity types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Account, Self::Class, Self::BankTransaction]
    }

    /// Returns the entity type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Class => "class",
            Self::BankTransaction => "bank_transaction",
        }
    }

    /// Returns the dossier table holding this entity type.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Account => Account::TABLE,
            Self::Class => Class::TABLE,
            Self::BankTransaction => BankTransaction::TABLE,
        }
    }

    /// Parses an entity type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "account" | "accounts" => Some(Self::Account),
            "class" | "classes" => Some(Self::Class),
            "bank_transaction" | "bank-transaction" | "bat" => Some(Self::BankTransaction),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s).ok_or_else(|| crate::Error::InvalidInput(format!("Unknown entity type: {s}")))
    }
}

/// Returns the DDL creating every dossier table.
#[must_use]
pub fn dossier_schema() -> String {
    [Account::SCHEMA, Class::SCHEMA, BankTransaction::SCHEMA].join("\n")
}
