//! Bank account transaction (BAT) lines used for reconciliation.

use super::EntityType;
use super::entity::{ImportEntity, check_arity, required, text_at};
use crate::io::StreamFormat;
use crate::storage::SqlValue;
use chrono::NaiveDate;

const STORED_DATE: &str = "%Y-%m-%d";

/// One bank statement line: `reference;date;amount;label`.
///
/// The date is read with the stream format's date layout and the amount with
/// its decimal and thousands separators.
#[derive(Debug, Clone, PartialEq)]
pub struct BankTransaction {
    /// Bank reference (natural key).
    pub reference: String,
    /// Value date.
    pub date: NaiveDate,
    /// Signed amount.
    pub amount: f64,
    /// Statement label.
    pub label: String,
}

impl ImportEntity for BankTransaction {
    const ENTITY: EntityType = EntityType::BankTransaction;
    const TABLE: &'static str = "bank_transactions";
    const KEY_COLUMN: &'static str = "reference";
    const COLUMNS: &'static [&'static str] = &["reference", "date", "amount", "label"];
    const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS bank_transactions (
        reference TEXT PRIMARY KEY NOT NULL,
        date TEXT NOT NULL,
        amount REAL NOT NULL,
        label TEXT NOT NULL
    );";

    fn from_fields(fields: &[String], format: &StreamFormat) -> Result<Self, String> {
        check_arity(fields, 4, 4)?;
        let reference = required(fields, 0, "reference")?.to_string();
        let date_text = required(fields, 1, "date")?;
        let date = format.parse_date(date_text).ok_or_else(|| {
            format!(
                "date '{date_text}' does not match {}",
                format.date_format().pattern()
            )
        })?;
        let amount_text = required(fields, 2, "amount")?;
        let amount = format
            .parse_decimal(amount_text)
            .ok_or_else(|| format!("invalid amount '{amount_text}'"))?;
        let label = required(fields, 3, "label")?.to_string();
        Ok(Self {
            reference,
            date,
            amount,
            label,
        })
    }

    fn key(&self) -> String {
        self.reference.clone()
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.reference.as_str().into(),
            self.date.format(STORED_DATE).to_string().into(),
            self.amount.into(),
            self.label.as_str().into(),
        ]
    }

    fn to_fields(row: &[SqlValue], format: &StreamFormat) -> Vec<String> {
        let stored_date = text_at(row, 1);
        let date = NaiveDate::parse_from_str(&stored_date, STORED_DATE)
            .map_or(stored_date, |d| format.format_date(d));
        let amount = row
            .get(2)
            .and_then(SqlValue::as_real)
            .map_or_else(|| text_at(row, 2), |a| format.format_decimal(a));
        vec![text_at(row, 0), date, amount, text_at(row, 3)]
    }
}
