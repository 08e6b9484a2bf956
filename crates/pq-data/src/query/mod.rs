//! Ad hoc query execution against the single virtual table
//!
//! Statements are validated before planning: exactly one statement, and it
//! must be a plain query. Mutation and DDL die here; references to tables
//! other than [`TABLE_NAME`](crate::cache::TABLE_NAME) die at plan time
//! because nothing else is registered in the session.

use std::path::Path;
use std::time::{Duration, Instant};

use datafusion::sql::sqlparser::ast::Statement;
use datafusion::sql::sqlparser::dialect::GenericDialect;
use datafusion::sql::sqlparser::parser::Parser;
use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::debug;

use pq_core::{DataError, QueryColumn, QueryResult, Result};

use crate::cache::ReaderLease;
use crate::config::DataConfig;
use crate::rows;

/// Reject anything that is not exactly one read-only query.
pub(crate) fn parse_single_query(sql: &str, path: &Path) -> Result<()> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| DataError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [] => Err(DataError::Parse {
            path: path.to_path_buf(),
            message: "empty statement".into(),
        }),
        [_] => Err(DataError::Parse {
            path: path.to_path_buf(),
            message: "only read-only SELECT statements are allowed".into(),
        }),
        _ => Err(DataError::Parse {
            path: path.to_path_buf(),
            message: "expected exactly one statement".into(),
        }),
    }
}

/// Execute a user-supplied query against the leased session.
///
/// Result size is bounded by `config.query_row_cap` and wall clock by
/// `config.query_timeout_ms`; both overruns fail loudly instead of
/// truncating.
pub async fn execute(
    lease: &ReaderLease,
    query: &str,
    config: &DataConfig,
) -> Result<QueryResult> {
    let path = lease.path().to_path_buf();
    parse_single_query(query, &path)?;

    let started = Instant::now();
    let run = async {
        let df = lease
            .ctx()
            .sql(query)
            .await
            .map_err(|e| DataError::Execution {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let columns: Vec<QueryColumn> = df
            .schema()
            .fields()
            .iter()
            .map(|f| QueryColumn {
                name: f.name().clone(),
                data_type: f.data_type().to_string(),
            })
            .collect();

        let mut stream = df
            .execute_stream()
            .await
            .map_err(|e| DataError::Execution {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut collected: Vec<Map<String, Value>> = Vec::new();
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| DataError::Execution {
                path: path.clone(),
                message: e.to_string(),
            })?;
            if collected.len() + batch.num_rows() > config.query_row_cap {
                return Err(DataError::ResultTooLarge {
                    path: path.clone(),
                    cap: config.query_row_cap,
                });
            }
            collected.extend(rows::batch_to_rows(&batch, &path)?);
        }
        Ok((columns, collected))
    };

    let (columns, result_rows) =
        tokio::time::timeout(Duration::from_millis(config.query_timeout_ms), run)
            .await
            .map_err(|_| DataError::Timeout {
                path: path.clone(),
                timeout_ms: config.query_timeout_ms,
            })??;

    let execution_time_ms = started.elapsed().as_millis();
    debug!(path = %path.display(), rows = result_rows.len(), execution_time_ms, "query complete");

    Ok(QueryResult {
        columns,
        rows: result_rows,
        execution_time_ms,
    })
}
