//! Analytic classes.

use super::EntityType;
use super::entity::{ImportEntity, check_arity, field, required, text_at};
use crate::io::StreamFormat;
use crate::storage::SqlValue;

/// An analytic class: `code;name[;notes]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    /// Class code (natural key).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl ImportEntity for Class {
    const ENTITY: EntityType = EntityType::Class;
    const TABLE: &'static str = "classes";
    const KEY_COLUMN: &'static str = "code";
    const COLUMNS: &'static [&'static str] = &["code", "name", "notes"];
    const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS classes (
        code TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        notes TEXT
    );";

    fn from_fields(fields: &[String], _format: &StreamFormat) -> Result<Self, String> {
        check_arity(fields, 2, 3)?;
        let code = required(fields, 0, "code")?.to_string();
        let name = required(fields, 1, "name")?.to_string();
        let notes = Some(field(fields, 2))
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok(Self { code, name, notes })
    }

    fn key(&self) -> String {
        self.code.clone()
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.code.as_str().into(),
            self.name.as_str().into(),
            self.notes.as_deref().map_or(SqlValue::Null, SqlValue::from),
        ]
    }

    fn to_fields(row: &[SqlValue], _format: &StreamFormat) -> Vec<String> {
        (0..Self::COLUMNS.len()).map(|i| text_at(row, i)).collect()
    }
}
