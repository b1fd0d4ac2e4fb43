//! Chart-of-accounts entries.

use super::EntityType;
use super::entity::{ImportEntity, check_arity, required, text_at};
use crate::io::StreamFormat;
use crate::storage::SqlValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Asset account.
    Asset,
    /// Liability account.
    Liability,
    /// Equity account.
    Equity,
    /// Income account.
    Income,
    /// Expense account.
    Expense,
}

impl AccountKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asset" => Some(Self::Asset),
            "liability" => Some(Self::Liability),
            "equity" => Some(Self::Equity),
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger account: `number;label;kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account number (natural key).
    pub number: String,
    /// Account label.
    pub label: String,
    /// Classification.
    pub kind: AccountKind,
}

impl ImportEntity for Account {
    const ENTITY: EntityType = EntityType::Account;
    const TABLE: &'static str = "accounts";
    const KEY_COLUMN: &'static str = "number";
    const COLUMNS: &'static [&'static str] = &["number", "label", "kind"];
    const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS accounts (
        number TEXT PRIMARY KEY NOT NULL,
        label TEXT NOT NULL,
        kind TEXT NOT NULL
            CHECK (kind IN ('asset', 'liability', 'equity', 'income', 'expense'))
    );";

    fn from_fields(fields: &[String], _format: &StreamFormat) -> Result<Self, String> {
        check_arity(fields, 3, 3)?;
        let number = required(fields, 0, "number")?.to_string();
        let label = required(fields, 1, "label")?.to_string();
        let kind_text = required(fields, 2, "kind")?;
        let kind = AccountKind::parse(kind_text)
            .ok_or_else(|| format!("unknown account kind '{kind_text}'"))?;
        Ok(Self {
            number,
            label,
            kind,
        })
    }

    fn key(&self) -> String {
        self.number.clone()
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.number.as_str().into(),
            self.label.as_str().into(),
            self.kind.as_str().into(),
        ]
    }

    fn to_fields(row: &[SqlValue], _format: &StreamFormat) -> Vec<String> {
        (0..Self::COLUMNS.len()).map(|i| text_at(row, i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_from_fields() {
        let account =
            Account::from_fields(&fields(&["512", "Bank", "Asset"]), &StreamFormat::default())
                .unwrap();
        assert_eq!(account.number, "512");
        assert_eq!(account.kind, AccountKind::Asset);
        assert_eq!(account.values()[2], SqlValue::from("asset"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = Account::from_fields(&fields(&["512", "Bank", "cash"]), &StreamFormat::default())
            .unwrap_err();
        assert!(err.contains("cash"));
    }

    #[test]
    fn test_arity_is_exact() {
        assert!(
            Account::from_fields(&fields(&["512", "Bank"]), &StreamFormat::default()).is_err()
        );
    }
}
