//! Read-only view of which catalog objects are visible.
//!
//! `system.tables` lists attached objects only. A missing row means the
//! object is either absent or detached; the store offers no safe way to
//! tell the two apart, so neither does this report.

use super::StateTransitionEngine;
use crate::catalog::ObjectKind;
use crate::sql::quote_literal;
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Attached,
    /// Absent or detached.
    Hidden,
}

/// One catalog object as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStatus {
    pub name: &'static str,
    pub kind: ObjectKind,
    pub visibility: Visibility,
    pub engine: Option<String>,
    pub total_rows: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SystemTableRow {
    name: String,
    engine: String,
    /// Null for engines without storage; 64-bit integers arrive quoted.
    #[serde(default)]
    total_rows: Value,
}

fn rows(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl StateTransitionEngine {
    /// One row per catalog object, creation order.
    pub async fn status(&self) -> QuoteflowResult<Vec<ObjectStatus>> {
        let names = self
            .catalog
            .objects()
            .iter()
            .map(|o| quote_literal(o.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT name, engine, total_rows FROM system.tables \
             WHERE database = currentDatabase() AND name IN ({names}) FORMAT JSONEachRow"
        );

        let body = self
            .client
            .execute(&sql)
            .await
            .map_err(|e| QuoteflowError::schema("STATUS", e))?;

        let mut visible: HashMap<String, SystemTableRow> = HashMap::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let row: SystemTableRow = serde_json::from_str(line).map_err(|e| {
                QuoteflowError::UnexpectedResponse(format!("system.tables row '{line}': {e}"))
            })?;
            visible.insert(row.name.clone(), row);
        }

        Ok(self
            .catalog
            .objects()
            .iter()
            .map(|o| match visible.get(o.name) {
                Some(row) => ObjectStatus {
                    name: o.name,
                    kind: o.kind,
                    visibility: Visibility::Attached,
                    engine: Some(row.engine.clone()),
                    total_rows: rows(&row.total_rows),
                },
                None => ObjectStatus {
                    name: o.name,
                    kind: o.kind,
                    visibility: Visibility::Hidden,
                    engine: None,
                    total_rows: None,
                },
            })
            .collect())
    }
}
