//! Paginated, filterable, sortable row reads
//!
//! Every read plans one single-table statement against the leased session,
//! so row-group pruning and predicate pushdown come from the engine and a
//! page touches O(offset + limit) filtered rows, never the whole file.
//! Filter strings are strictly re-parsed before they are embedded, whatever
//! the UI claims about them.

use serde_json::{Map, Value};
use tracing::debug;

use pq_core::{DataError, PageRequest, Result, SortSpec};

use crate::cache::{ReaderLease, TABLE_NAME};
use crate::config::DataConfig;
use crate::query::parse_single_query;
use crate::rows;

/// Assemble the single-table statement shared by reads and exports.
pub(crate) fn build_select(
    filter: Option<&str>,
    sort: Option<&SortSpec>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> String {
    let mut sql = format!("SELECT * FROM {}", TABLE_NAME);
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if let Some(sort) = sort {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_ident(&sort.column),
            sort.direction.as_sql()
        ));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = offset.filter(|o| *o > 0) {
        sql.push_str(&format!(" OFFSET {}", offset));
    }
    sql
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read one bounded window of rows.
pub async fn read_page(
    lease: &ReaderLease,
    request: &PageRequest,
    config: &DataConfig,
) -> Result<Vec<Map<String, Value>>> {
    let path = lease.path();
    if request.limit == 0 {
        return Ok(Vec::new());
    }
    let limit = request.limit.min(config.page_limit_cap);

    // An arbitrary sort has to materialize the window; refuse windows past
    // the documented cap instead of degrading silently.
    if request.sort.is_some() {
        let window_end = request.offset.saturating_add(limit);
        if window_end > config.sort_cap {
            return Err(DataError::ResultTooLarge {
                path: path.to_path_buf(),
                cap: config.sort_cap,
            });
        }
    }

    let sql = build_select(
        request.filter.as_deref(),
        request.sort.as_ref(),
        Some(request.offset),
        Some(limit),
    );
    parse_single_query(&sql, path)?;
    debug!(path = %path.display(), offset = request.offset, limit, "reading page");

    let df = lease.ctx().sql(&sql).await.map_err(|e| DataError::Execution {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let batches = df.collect().await.map_err(|e| DataError::Execution {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    rows::batches_to_rows(&batches, path)
}

/// Count predicate-matching rows without materializing them.
pub async fn count(lease: &ReaderLease, filter: Option<&str>) -> Result<usize> {
    let path = lease.path();

    let mut sql = format!("SELECT COUNT(*) FROM {}", TABLE_NAME);
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    parse_single_query(&sql, path)?;

    let df = lease.ctx().sql(&sql).await.map_err(|e| DataError::Execution {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let batches = df.collect().await.map_err(|e| DataError::Execution {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let count = batches
        .first()
        .filter(|b| b.num_rows() > 0)
        .and_then(|b| {
            b.column(0)
                .as_any()
                .downcast_ref::<arrow::array::Int64Array>()
                .map(|a| a.value(0))
        })
        .unwrap_or(0);

    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::test_util::{fixture_name_count, write_fixture};
    use std::sync::Arc;

    async fn lease_for(rows: usize) -> (tempfile::TempDir, Arc<FileCache>, ReaderLease) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.parquet");
        write_fixture(&path, rows);
        let cache = Arc::new(FileCache::new(DataConfig::default()));
        let lease = cache.acquire(&path).await.unwrap();
        (dir, cache, lease)
    }

    fn page(offset: usize, limit: usize) -> PageRequest {
        PageRequest::new(offset, limit)
    }

    #[tokio::test]
    async fn pagination_is_deterministic() {
        let (_d, _c, lease) = lease_for(250).await;
        let config = DataConfig::default();

        let full = read_page(&lease, &page(0, 250), &config).await.unwrap();
        let window = read_page(&lease, &page(40, 25), &config).await.unwrap();
        assert_eq!(window.len(), 25);
        assert_eq!(window, full[40..65].to_vec());
    }

    #[tokio::test]
    async fn pages_past_eof_shrink_then_empty() {
        let (_d, _c, lease) = lease_for(250).await;
        let config = DataConfig::default();

        assert_eq!(read_page(&lease, &page(0, 100), &config).await.unwrap().len(), 100);
        assert_eq!(read_page(&lease, &page(200, 100), &config).await.unwrap().len(), 50);
        assert_eq!(read_page(&lease, &page(250, 100), &config).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn filter_counts_only_matching_rows_toward_the_window() {
        let (_d, _c, lease) = lease_for(100).await;
        let config = DataConfig::default();
        let filter = Some("name = 'alpha'".to_string());

        let all = read_page(
            &lease,
            &PageRequest {
                filter: filter.clone(),
                ..page(0, 100)
            },
            &config,
        )
        .await
        .unwrap();
        assert_eq!(all.len(), fixture_name_count(100, "alpha"));

        let window = read_page(
            &lease,
            &PageRequest {
                filter,
                ..page(2, 3)
            },
            &config,
        )
        .await
        .unwrap();
        assert_eq!(window, all[2..5].to_vec());
    }

    #[tokio::test]
    async fn count_matches_a_full_filtered_scan() {
        let (_d, _c, lease) = lease_for(120).await;
        assert_eq!(count(&lease, None).await.unwrap(), 120);
        assert_eq!(
            count(&lease, Some("name = 'beta'")).await.unwrap(),
            fixture_name_count(120, "beta")
        );
        assert_eq!(count(&lease, Some("name IS NULL")).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn sorted_reads_order_by_the_requested_column() {
        let (_d, _c, lease) = lease_for(50).await;
        let config = DataConfig::default();
        let request = PageRequest {
            sort: Some(SortSpec {
                column: "qty".into(),
                direction: pq_core::SortDirection::Desc,
            }),
            ..page(0, 50)
        };
        let rows = read_page(&lease, &request, &config).await.unwrap();
        let qtys: Vec<i64> = rows.iter().map(|r| r["qty"].as_i64().unwrap()).collect();
        let mut sorted = qtys.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(qtys, sorted);
    }

    #[tokio::test]
    async fn sort_windows_past_the_cap_are_refused() {
        let (_d, _c, lease) = lease_for(50).await;
        let config = DataConfig {
            sort_cap: 30,
            ..DataConfig::default()
        };
        let request = PageRequest {
            sort: Some(SortSpec {
                column: "qty".into(),
                direction: pq_core::SortDirection::Asc,
            }),
            ..page(25, 10)
        };
        let err = read_page(&lease, &request, &config).await.unwrap_err();
        assert_eq!(err.kind(), "ResultTooLarge");

        // The same window without a sort streams fine.
        let request = page(25, 10);
        assert_eq!(read_page(&lease, &request, &config).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn page_limit_is_clamped() {
        let (_d, _c, lease) = lease_for(100).await;
        let config = DataConfig {
            page_limit_cap: 10,
            ..DataConfig::default()
        };
        let rows = read_page(&lease, &page(0, 1_000_000), &config).await.unwrap();
        assert_eq!(rows.len(), 10);
    }

    #[tokio::test]
    async fn malformed_filters_are_parse_errors() {
        let (_d, _c, lease) = lease_for(10).await;
        let config = DataConfig::default();
        let request = PageRequest {
            filter: Some("name = 'alpha".into()),
            ..page(0, 10)
        };
        let err = read_page(&lease, &request, &config).await.unwrap_err();
        assert_eq!(err.kind(), "ParseError");

        let err = count(&lease, Some("qty >")).await.unwrap_err();
        assert_eq!(err.kind(), "ParseError");
    }

    #[test]
    fn build_select_covers_all_clauses() {
        assert_eq!(build_select(None, None, None, None), "SELECT * FROM t");
        assert_eq!(
            build_select(Some("qty > 1"), None, Some(10), Some(5)),
            "SELECT * FROM t WHERE qty > 1 LIMIT 5 OFFSET 10"
        );
        let sort = SortSpec {
            column: "name".into(),
            direction: pq_core::SortDirection::Asc,
        };
        assert_eq!(
            build_select(None, Some(&sort), Some(0), Some(5)),
            "SELECT * FROM t ORDER BY \"name\" ASC LIMIT 5"
        );
    }
}
