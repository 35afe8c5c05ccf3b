//! Range delete.
//!
//! ```text
//! 1. count      raw and/or rollup rows in range   (dry-run stops here)
//! 2. detach     rollup view                        (rollup targeted)
//! 3. delete     raw rows                           (count > 0)
//! 4. delete     rollup rows                        (count > 0)
//! 5. attach     rollup view, with retry            (always, if 2 ran)
//! ```
//!
//! Step 5 runs whatever happened in steps 3 and 4. A failure there is
//! fatal: Clean runs against a live pipeline, and an aggregation view left
//! detached silently stops the rollup.

use super::StateTransitionEngine;
use crate::catalog::PipelineObject;
use crate::catalog::names::is_timeframe;
use crate::retry::attach_with_retry;
use crate::scope::CleanTarget;
use crate::sql::quote_literal;
use crate::time_range::TimeRange;
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use std::fmt;

/// What to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRequest {
    pub range: TimeRange,
    /// Restrict to one symbol.
    pub key: Option<String>,
    /// Restrict rollup rows to one timeframe.
    pub granularity: Option<String>,
    pub target: CleanTarget,
    pub dry_run: bool,
}

impl CleanRequest {
    /// Validate the filters. Runs before any network call.
    pub fn new(
        range: TimeRange,
        key: Option<String>,
        granularity: Option<String>,
        target: CleanTarget,
        dry_run: bool,
    ) -> QuoteflowResult<Self> {
        if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(QuoteflowError::Validation("--key must not be empty".into()));
        }
        if let Some(tf) = granularity.as_deref() {
            if !is_timeframe(tf) {
                return Err(QuoteflowError::Validation(format!(
                    "unknown --granularity '{tf}'"
                )));
            }
            if !target.includes_rollup() {
                return Err(QuoteflowError::Validation(
                    "--granularity only applies to the rollup table".into(),
                ));
            }
        }

        Ok(Self {
            range,
            key,
            granularity,
            target,
            dry_run,
        })
    }

    fn raw_condition(&self) -> String {
        let mut cond = self.range.sql_condition("ts");
        if let Some(key) = &self.key {
            cond.push_str(&format!(" AND symbol = {}", quote_literal(key)));
        }
        cond
    }

    fn rollup_condition(&self) -> String {
        let mut cond = self.raw_condition();
        if let Some(tf) = &self.granularity {
            cond.push_str(&format!(" AND tf = {}", quote_literal(tf)));
        }
        cond
    }
}

/// Outcome of a Clean. Counts are `None` for tables outside the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub raw_rows: Option<u64>,
    pub rollup_rows: Option<u64>,
    pub raw_deleted: bool,
    pub rollup_deleted: bool,
    /// ATTACH attempts spent restoring the rollup view, if it was detached.
    pub reattach_attempts: Option<u32>,
    pub dry_run: bool,
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            f.write_str("[dry-run] No changes made.")
        } else {
            f.write_str("Done. Range deleted.")
        }
    }
}

impl StateTransitionEngine {
    /// Delete rows in `request.range` from the targeted tables.
    pub async fn clean(&self, request: &CleanRequest) -> QuoteflowResult<CleanReport> {
        let raw = self.catalog.raw_table().filter(|_| request.target.includes_raw());
        let rollup = self
            .catalog
            .rollup_table()
            .filter(|_| request.target.includes_rollup());

        tracing::info!(
            range = %request.range,
            key = request.key.as_deref().unwrap_or("ALL"),
            granularity = request.granularity.as_deref().unwrap_or("ALL"),
            target = %request.target,
            dry_run = request.dry_run,
            "Clean started"
        );

        let mut report = CleanReport {
            dry_run: request.dry_run,
            ..CleanReport::default()
        };

        // Raw rows are counted through FINAL so replaced duplicates don't inflate it.
        if let Some(table) = raw {
            let sql = format!(
                "SELECT count() FROM {} FINAL WHERE {}",
                table.name,
                request.raw_condition()
            );
            report.raw_rows = Some(self.count(table, &sql).await?);
        }
        if let Some(table) = rollup {
            let sql = format!(
                "SELECT count() FROM {} WHERE {}",
                table.name,
                request.rollup_condition()
            );
            report.rollup_rows = Some(self.count(table, &sql).await?);
        }

        if request.dry_run {
            tracing::info!("Dry run, no changes made");
            return Ok(report);
        }

        let view = match rollup {
            Some(_) => Some(self.catalog.rollup_view().ok_or_else(|| {
                QuoteflowError::Internal("catalog has no rollup view".into())
            })?),
            None => None,
        };

        if let Some(view) = view {
            self.client
                .execute(&format!("DETACH TABLE IF EXISTS {}", view.name))
                .await
                .map_err(|e| QuoteflowError::schema(format!("DETACH {}", view.name), e))?;
            tracing::info!(object = %view.name, "DETACH ok");
        }

        let deleted = self.delete_ranges(request, raw, rollup, &mut report).await;

        let Some(view) = view else {
            return deleted.map(|()| report);
        };

        match attach_with_retry(self.client.as_ref(), view.name, &self.retry).await {
            Ok(outcome) => {
                report.reattach_attempts = Some(outcome.attempts());
                deleted.map(|()| report)
            }
            Err(reattach) => {
                if let Err(e) = &deleted {
                    tracing::error!(error = %e, "Delete failed before reattach");
                }
                tracing::error!(
                    object = %view.name,
                    error = %reattach,
                    "Rollup view not re-attached. Run manually: ATTACH TABLE {}",
                    view.name
                );
                Err(QuoteflowError::Reattach {
                    object: view.name.to_string(),
                    reason: reattach.to_string(),
                })
            }
        }
    }

    async fn count(&self, table: &PipelineObject, sql: &str) -> QuoteflowResult<u64> {
        let body = self
            .client
            .execute(sql)
            .await
            .map_err(|e| QuoteflowError::schema(format!("COUNT {}", table.name), e))?;
        let rows = body.trim().parse::<u64>().map_err(|_| {
            QuoteflowError::UnexpectedResponse(format!("count for {}: '{body}'", table.name))
        })?;
        tracing::info!(table = %table.name, rows, "Rows in range");
        Ok(rows)
    }

    async fn delete_ranges(
        &self,
        request: &CleanRequest,
        raw: Option<&PipelineObject>,
        rollup: Option<&PipelineObject>,
        report: &mut CleanReport,
    ) -> QuoteflowResult<()> {
        let targets = [
            (raw, report.raw_rows, request.raw_condition()),
            (rollup, report.rollup_rows, request.rollup_condition()),
        ];

        for (index, (table, rows, condition)) in targets.into_iter().enumerate() {
            let Some(table) = table else { continue };
            if rows == Some(0) {
                tracing::info!(table = %table.name, "Nothing to delete");
                continue;
            }

            self.client
                .execute(&format!("DELETE FROM {} WHERE {condition}", table.name))
                .await
                .map_err(|e| QuoteflowError::schema(format!("DELETE FROM {}", table.name), e))?;
            tracing::info!(table = %table.name, "DELETE ok");

            if index == 0 {
                report.raw_deleted = true;
            } else {
                report.rollup_deleted = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::names::{tables, views};
    use crate::catalog::{AdapterSettings, ObjectCatalog};
    use crate::testing::{ObjectState, SimulatedStore, fast_retry};
    use std::sync::Arc;

    const RANGE_CONDITION: &str = "ts >= '2026-02-15 20:00:00' AND ts < '2026-02-15 21:00:00'";

    fn engine(store: &Arc<SimulatedStore>) -> StateTransitionEngine {
        StateTransitionEngine::new(store.clone(), ObjectCatalog::new(&AdapterSettings::default()))
            .with_retry_policy(fast_retry())
    }

    fn request(target: CleanTarget, dry_run: bool) -> CleanRequest {
        let range = TimeRange::parse("2026-02-15T20:00:00", "2026-02-15T21:00:00").unwrap();
        CleanRequest::new(range, None, None, target, dry_run).unwrap()
    }

    #[tokio::test]
    async fn deletes_both_tables_inside_view_bracket() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 120);
        store.set_row_count(tables::OHLC, 24);

        let report = engine(&store)
            .clean(&request(CleanTarget::Both, false))
            .await
            .unwrap();

        assert_eq!(
            store.statements(),
            vec![
                format!("SELECT count() FROM quotes FINAL WHERE {RANGE_CONDITION}"),
                format!("SELECT count() FROM ohlc WHERE {RANGE_CONDITION}"),
                "DETACH TABLE IF EXISTS mv_quotes_to_ohlc".to_string(),
                format!("DELETE FROM quotes WHERE {RANGE_CONDITION}"),
                format!("DELETE FROM ohlc WHERE {RANGE_CONDITION}"),
                "ATTACH TABLE mv_quotes_to_ohlc".to_string(),
            ]
        );
        assert_eq!(report.raw_rows, Some(120));
        assert_eq!(report.rollup_rows, Some(24));
        assert!(report.raw_deleted && report.rollup_deleted);
        assert_eq!(report.reattach_attempts, Some(1));
        assert!(report.to_string().starts_with("Done."));
        assert!(store.is_attached(views::QUOTES_TO_OHLC));
    }

    #[tokio::test]
    async fn dry_run_only_counts() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 120);

        let report = engine(&store)
            .clean(&request(CleanTarget::Both, true))
            .await
            .unwrap();

        assert!(store.statements_starting_with("DELETE").is_empty());
        assert!(store.statements_starting_with("DETACH").is_empty());
        assert!(store.is_attached(views::QUOTES_TO_OHLC));
        assert_eq!(report.raw_rows, Some(120));
        assert!(report.to_string().contains("dry-run"));
    }

    #[tokio::test]
    async fn zero_counts_still_bracket_view() {
        let store = Arc::new(SimulatedStore::with_pipeline());

        engine(&store)
            .clean(&request(CleanTarget::Both, false))
            .await
            .unwrap();

        assert!(store.statements_starting_with("DELETE").is_empty());
        assert_eq!(store.count_statements("DETACH TABLE IF EXISTS mv_quotes_to_ohlc"), 1);
        assert_eq!(store.count_statements("ATTACH TABLE mv_quotes_to_ohlc"), 1);
        assert!(store.is_attached(views::QUOTES_TO_OHLC));
    }

    #[tokio::test]
    async fn raw_only_leaves_view_alone() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 5);

        let report = engine(&store)
            .clean(&request(CleanTarget::RawOnly, false))
            .await
            .unwrap();

        assert_eq!(report.rollup_rows, None);
        assert_eq!(report.reattach_attempts, None);
        assert!(store.statements_starting_with("DETACH").is_empty());
        assert!(store.statements_starting_with("ATTACH").is_empty());
        assert_eq!(store.statements_starting_with("DELETE FROM quotes").len(), 1);
    }

    #[tokio::test]
    async fn failed_delete_still_reattaches_view() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 120);
        store.set_row_count(tables::OHLC, 24);
        store.fail_statement("DELETE FROM quotes", "Code: 241. Memory limit exceeded");

        let err = engine(&store)
            .clean(&request(CleanTarget::Both, false))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("DELETE FROM quotes failed"));
        assert!(store.statements_starting_with("DELETE FROM ohlc").is_empty());
        assert!(store.is_attached(views::QUOTES_TO_OHLC));
    }

    #[tokio::test]
    async fn rollup_delete_failure_after_raw_delete_reattaches_view() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 120);
        store.set_row_count(tables::OHLC, 24);
        store.fail_statement("DELETE FROM ohlc", "Code: 241. Memory limit exceeded");

        let err = engine(&store)
            .clean(&request(CleanTarget::Both, false))
            .await
            .unwrap_err();

        assert_eq!(store.statements_starting_with("DELETE FROM quotes").len(), 1);
        assert_eq!(store.row_count(tables::QUOTES), 0);
        assert!(matches!(err, QuoteflowError::SchemaOperation { .. }));
        assert!(err.to_string().starts_with("DELETE FROM ohlc failed"));
        let delete = store.position("DELETE FROM ohlc").unwrap();
        let attach = store.position("ATTACH TABLE mv_quotes_to_ohlc").unwrap();
        assert!(delete < attach);
        assert!(store.is_attached(views::QUOTES_TO_OHLC));
    }

    #[tokio::test]
    async fn reattach_error_wins_over_delete_error() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 120);
        store.set_row_count(tables::OHLC, 24);
        store.fail_statement("DELETE FROM quotes", "Code: 241. Memory limit exceeded");
        store.fail_attach_busy(views::QUOTES_TO_OHLC, 10);

        let err = engine(&store)
            .clean(&request(CleanTarget::Both, false))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteflowError::Reattach { .. }));
        assert!(err.to_string().contains("ATTACH TABLE mv_quotes_to_ohlc"));
        assert_eq!(store.count_statements("ATTACH TABLE mv_quotes_to_ohlc"), 10);
        assert_eq!(store.state(views::QUOTES_TO_OHLC), ObjectState::Detached);
    }

    #[tokio::test]
    async fn reattach_retries_busy_view() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::OHLC, 24);
        store.fail_attach_busy(views::QUOTES_TO_OHLC, 4);

        let report = engine(&store)
            .clean(&request(CleanTarget::RollupOnly, false))
            .await
            .unwrap();

        assert_eq!(report.reattach_attempts, Some(5));
        assert_eq!(store.count_statements("ATTACH TABLE mv_quotes_to_ohlc"), 5);
        assert!(store.is_attached(views::QUOTES_TO_OHLC));
    }

    #[tokio::test]
    async fn reattach_failure_is_fatal() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::OHLC, 24);
        store.fail_attach_busy(views::QUOTES_TO_OHLC, 10);

        let err = engine(&store)
            .clean(&request(CleanTarget::RollupOnly, false))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteflowError::Reattach { .. }));
        assert!(err.to_string().contains("ATTACH TABLE mv_quotes_to_ohlc"));
        assert_eq!(store.state(views::QUOTES_TO_OHLC), ObjectState::Detached);
    }

    #[tokio::test]
    async fn filters_reach_every_statement() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.set_row_count(tables::QUOTES, 1);
        store.set_row_count(tables::OHLC, 1);
        let range = TimeRange::parse("2026-02-15", "2026-02-16").unwrap();
        let request = CleanRequest::new(
            range,
            Some("EURUSD".into()),
            Some("1m".into()),
            CleanTarget::Both,
            false,
        )
        .unwrap();

        engine(&store).clean(&request).await.unwrap();

        let raw = &store.statements_starting_with("DELETE FROM quotes")[0];
        assert!(raw.ends_with("AND symbol = 'EURUSD'"));
        let rollup = &store.statements_starting_with("DELETE FROM ohlc")[0];
        assert!(rollup.ends_with("AND symbol = 'EURUSD' AND tf = '1m'"));
    }

    #[test]
    fn rejects_bad_filters() {
        let range = TimeRange::parse("2026-02-15", "2026-02-16").unwrap();
        assert!(CleanRequest::new(range, Some(" ".into()), None, CleanTarget::Both, false).is_err());
        assert!(CleanRequest::new(range, None, Some("2m".into()), CleanTarget::Both, false).is_err());
        assert!(CleanRequest::new(range, None, Some("1h".into()), CleanTarget::RawOnly, false).is_err());
    }

    #[tokio::test]
    async fn count_failure_aborts_before_detach() {
        let store = Arc::new(SimulatedStore::with_pipeline());
        store.fail_statement("SELECT count() FROM ohlc", "Code: 47. Unknown identifier");

        let err = engine(&store)
            .clean(&request(CleanTarget::Both, false))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteflowError::SchemaOperation { .. }));
        assert!(store.statements_starting_with("DETACH").is_empty());
    }
}
