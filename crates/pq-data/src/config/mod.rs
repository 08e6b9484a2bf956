//! Runtime tunables for the data layer

use serde::{Deserialize, Serialize};

/// Tunables for reads, queries, and exports.
///
/// Defaults are the documented production values; tests override individual
/// fields via struct update syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Maximum rows a single page request may return.
    pub page_limit_cap: usize,
    /// Materialization cap for sorted reads; a sorted page whose window
    /// ends past this fails with `ResultTooLarge`.
    pub sort_cap: usize,
    /// Maximum rows an ad hoc query may return before `ResultTooLarge`.
    pub query_row_cap: usize,
    /// Wall-clock bound for query execution.
    pub query_timeout_ms: u64,
    /// Wall-clock bound for a whole export.
    pub export_timeout_ms: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            page_limit_cap: 10_000,
            sort_cap: 100_000,
            query_row_cap: 50_000,
            query_timeout_ms: 30_000,
            export_timeout_ms: 120_000,
        }
    }
}
