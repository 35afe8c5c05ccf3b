//! Pipeline object lifecycle orchestration.
//!
//! ## Architecture
//!
//! Schema commands are table-driven: each command (and, for Recreate, each
//! scope) maps to an [`ExecutionPlan`] built from the [`ObjectCatalog`]:
//!
//! ```text
//! Init:
//!   1. storage    create IF NOT EXISTS
//!   2. adapters   reveal (best-effort ATTACH), create IF NOT EXISTS
//!   3. views      create IF NOT EXISTS
//!   4. disarm     detach consumer adapters
//!
//! Recreate(scope):
//!   1. pre-guard  detach views writing into replaced storage (StorageOnly)
//!   2. teardown   ensure-absent, reverse creation order; with a backup
//!                 suffix, storage is swapped out first
//!   3. reveal     attach out-of-scope source adapters (ViewsOnly)
//!   4. rebuild    create, creation order
//!   5. conceal    re-detach what step 3 revealed
//!   6. post-guard reattach step 1 views (warn only)
//!   7. disarm     detach consumer adapters (adapters in scope)
//!
//! Drop:
//!   1. teardown   ensure-absent, full reverse order
//! ```
//!
//! Clean is not a plan: its rollup view reattachment must run on every exit
//! path, including after a failed delete, which a fail-fast plan cannot
//! express. See [`clean`].
//!
//! The engine never reads object state before acting. Every step is built
//! from statements that converge from any starting state.

mod clean;
mod plans;
mod status;
mod steps;

pub use clean::{CleanReport, CleanRequest};
pub use plans::{disable_plan, drop_plan, enable_plan, init_plan, recreate_plan};
pub use status::{ObjectStatus, Visibility};

use crate::catalog::ObjectCatalog;
use crate::client::ExecutionClient;
use crate::pipeline::{ExecutionPlan, PipelineExecutor, PipelineMetrics};
use crate::retry::RetryPolicy;
use crate::scope::ScopeFilter;
use chrono::{DateTime, Utc};
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state handed to every plan step.
pub struct EngineContext {
    pub(crate) client: Arc<dyn ExecutionClient>,
    pub(crate) retry: RetryPolicy,
    /// Objects a reveal step made visible, so they can be hidden again.
    revealed: Mutex<HashSet<String>>,
    /// Non-fatal problems the operator has to act on.
    warnings: Mutex<Vec<String>>,
}

impl EngineContext {
    fn new(client: Arc<dyn ExecutionClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            revealed: Mutex::new(HashSet::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn mark_revealed(&self, object: &str) {
        self.revealed.lock().await.insert(object.to_string());
    }

    /// Whether `object` was revealed, forgetting it.
    pub(crate) async fn take_revealed(&self, object: &str) -> bool {
        self.revealed.lock().await.remove(object)
    }

    pub(crate) async fn warn(&self, warning: String) {
        self.warnings.lock().await.push(warning);
    }
}

pub type EngineCtx = Arc<EngineContext>;

/// Backup suffix for `now`, e.g. `_bak_20260216_143052`.
pub fn backup_suffix(now: DateTime<Utc>) -> String {
    now.format("_bak_%Y%m%d_%H%M%S").to_string()
}

/// Converge `object` to absent from any starting state.
///
/// A detached object is invisible to `DROP ... IF EXISTS`, so it is made
/// visible first. That ATTACH is allowed to fail: it fails exactly when the
/// object is already visible or already gone.
pub(crate) async fn ensure_absent(
    client: &dyn ExecutionClient,
    object: &str,
    drop_statement: &str,
) -> QuoteflowResult<()> {
    if let Err(e) = client.execute(&format!("ATTACH TABLE {object}")).await {
        tracing::debug!(object = %object, kind = %e.kind, "Pre-drop ATTACH ignored");
    }

    match client.execute(drop_statement).await {
        Ok(_) => {
            tracing::info!(object = %object, "DROP ok");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::info!(object = %object, "DROP skipped (absent)");
            Ok(())
        }
        Err(e) => Err(QuoteflowError::schema(format!("DROP {object}"), e)),
    }
}

/// Drives Init, Recreate, Clean, Drop and the supporting commands against
/// one store.
pub struct StateTransitionEngine {
    client: Arc<dyn ExecutionClient>,
    catalog: ObjectCatalog,
    retry: RetryPolicy,
}

impl StateTransitionEngine {
    pub fn new(client: Arc<dyn ExecutionClient>, catalog: ObjectCatalog) -> Self {
        Self {
            client,
            catalog,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Verify the store answers before anything else is attempted.
    pub async fn probe(&self) -> QuoteflowResult<()> {
        self.client
            .execute("SELECT 1")
            .await
            .map_err(QuoteflowError::Connectivity)?;
        tracing::debug!("Store reachable");
        Ok(())
    }

    /// Create every object if missing, leaving consumers detached.
    pub async fn init(&self) -> QuoteflowResult<PipelineMetrics> {
        tracing::info!("Init started");
        self.run(init_plan(&self.catalog)).await
    }

    /// Drop and recreate the objects selected by `scope`.
    pub async fn recreate(&self, scope: ScopeFilter) -> QuoteflowResult<PipelineMetrics> {
        tracing::info!(scope = %scope, "Recreate started");
        self.run(recreate_plan(&self.catalog, scope, None)).await
    }

    /// Like [`recreate`](Self::recreate), but storage tables are first
    /// swapped out to `<table><suffix>` with their data instead of dropped.
    ///
    /// # Errors
    ///
    /// `Validation` when `scope` does not include storage.
    pub async fn recreate_with_backup(
        &self,
        scope: ScopeFilter,
        suffix: &str,
    ) -> QuoteflowResult<PipelineMetrics> {
        if !scope.includes_storage() {
            return Err(QuoteflowError::Validation(format!(
                "--backup needs storage in scope, got {scope}"
            )));
        }
        tracing::info!(scope = %scope, suffix = %suffix, "Recreate with backup started");
        self.run(recreate_plan(&self.catalog, scope, Some(suffix))).await
    }

    /// Remove every object.
    pub async fn drop_pipeline(&self) -> QuoteflowResult<PipelineMetrics> {
        tracing::info!("Drop started");
        self.run(drop_plan(&self.catalog)).await
    }

    /// Attach every consumer adapter, starting consumption.
    pub async fn enable(&self) -> QuoteflowResult<PipelineMetrics> {
        tracing::info!("Enable started");
        self.run(enable_plan(&self.catalog)).await
    }

    /// Detach every consumer adapter, stopping consumption.
    pub async fn disable(&self) -> QuoteflowResult<PipelineMetrics> {
        tracing::info!("Disable started");
        self.run(disable_plan(&self.catalog)).await
    }

    async fn run(&self, plan: ExecutionPlan<EngineCtx>) -> QuoteflowResult<PipelineMetrics> {
        let ctx = Arc::new(EngineContext::new(self.client.clone(), self.retry));
        let mut metrics = PipelineExecutor::execute(plan, ctx.clone()).await?;
        metrics.warnings = std::mem::take(&mut *ctx.warnings.lock().await);

        tracing::info!(
            steps = metrics.task_count(),
            warnings = metrics.warnings.len(),
            duration_ms = metrics.total_duration_ms,
            "Plan completed"
        );
        for stage in &metrics.stages {
            tracing::debug!(stage = stage.name, duration_ms = stage.duration_ms, "Stage timing");
        }
        Ok(metrics)
    }
}
