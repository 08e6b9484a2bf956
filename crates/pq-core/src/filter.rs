//! Translation of UI-built filter conditions into one conjunctive predicate
//!
//! The UI assembles conditions as structured `{column, operator, value}`
//! triples; this module turns them into a single boolean expression the
//! reader, executor, and export pipeline all consume identically. Pure
//! string work, no I/O.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::FileMetadata;

/// Comparison operators accepted from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOperator {
    fn as_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::GtEq => ">=",
            FilterOperator::LtEq => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Null checks are the only operators that take no right-hand value.
    fn requires_value(&self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

/// One UI-built condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Option<String>,
}

/// Build the conjunctive predicate for a list of conditions.
///
/// Conditions missing a column, or missing a value where one is required,
/// are dropped. An empty result means "match everything" and is returned
/// as `None`. Values on string-typed columns, and all `LIKE` values, are
/// single-quoted with embedded quotes doubled; `LIKE` against a non-string
/// column casts the column to text first.
pub fn translate_conditions(
    conditions: &[FilterCondition],
    metadata: &FileMetadata,
) -> Option<String> {
    let mut clauses = Vec::with_capacity(conditions.len());

    for cond in conditions {
        if cond.column.trim().is_empty() {
            debug!("dropping filter condition with empty column");
            continue;
        }
        let value = match (cond.operator.requires_value(), cond.value.as_deref()) {
            (true, Some(v)) => Some(v),
            (true, None) => {
                debug!(column = %cond.column, "dropping filter condition with missing value");
                continue;
            }
            (false, _) => None,
        };

        let is_string = metadata
            .column(&cond.column)
            .map(|c| c.is_string())
            .unwrap_or(false);

        clauses.push(render_clause(cond, value, is_string));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn render_clause(cond: &FilterCondition, value: Option<&str>, is_string: bool) -> String {
    let op = cond.operator.as_sql();

    match (cond.operator, value) {
        (FilterOperator::IsNull | FilterOperator::IsNotNull, _) => {
            format!("{} {}", cond.column, op)
        }
        (FilterOperator::Like, Some(v)) => {
            // LIKE only makes sense over text; non-string columns are cast.
            let lhs = if is_string {
                cond.column.clone()
            } else {
                format!("CAST({} AS VARCHAR)", cond.column)
            };
            format!("{} {} '{}'", lhs, op, escape_quotes(v))
        }
        (_, Some(v)) if is_string => {
            format!("{} {} '{}'", cond.column, op, escape_quotes(v))
        }
        (_, Some(v)) => format!("{} {} {}", cond.column, op, v),
        // requires_value() filtered out the remaining combinations
        (_, None) => unreachable!("valueless comparison survived validation"),
    }
}

/// Double embedded single quotes so values embed safely in a literal.
fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}
