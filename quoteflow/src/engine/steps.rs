//! Plan steps.
//!
//! Each step wraps one idempotent primitive. Step names follow
//! `<action>:<object>` and double as metric keys.

use super::{EngineCtx, ensure_absent};
use crate::catalog::{CreateMode, PipelineObject};
use crate::pipeline::PipelineTask;
use crate::retry::attach_with_retry;
use async_trait::async_trait;
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};

/// `CREATE [IF NOT EXISTS]` one object.
pub(crate) struct CreateStep {
    name: String,
    object: &'static str,
    statement: String,
    mode: CreateMode,
}

impl CreateStep {
    pub(crate) fn new(object: &PipelineObject, mode: CreateMode) -> Self {
        Self {
            name: format!("create:{}", object.name),
            object: object.name,
            statement: object.create_statement(mode),
            mode,
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for CreateStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        match ctx.client.execute(&self.statement).await {
            Ok(_) => {
                tracing::info!(object = %self.object, "CREATE ok");
                Ok(())
            }
            // Only the guarded form may treat an existing object as done. A
            // strict create that collides means teardown did not converge.
            Err(e) if self.mode == CreateMode::IfNotExists && e.is_already_exists() => {
                tracing::info!(object = %self.object, "CREATE skipped (already exists)");
                Ok(())
            }
            Err(e) => Err(QuoteflowError::schema(format!("CREATE {}", self.object), e)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Best-effort `ATTACH`. Succeeds only when the object was detached; that is
/// recorded so [`DetachRevealedStep`] can restore it.
pub(crate) struct RevealStep {
    name: String,
    object: &'static str,
}

impl RevealStep {
    pub(crate) fn new(object: &PipelineObject) -> Self {
        Self {
            name: format!("reveal:{}", object.name),
            object: object.name,
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for RevealStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        match ctx.client.execute(&format!("ATTACH TABLE {}", self.object)).await {
            Ok(_) => {
                tracing::info!(object = %self.object, "Revealed detached object");
                ctx.mark_revealed(self.object).await;
            }
            Err(e) => {
                tracing::debug!(object = %self.object, kind = %e.kind, "Reveal ATTACH ignored");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Converge one object to absent.
pub(crate) struct EnsureAbsentStep {
    name: String,
    object: &'static str,
    drop_statement: String,
}

impl EnsureAbsentStep {
    pub(crate) fn new(object: &PipelineObject) -> Self {
        Self {
            name: format!("ensure_absent:{}", object.name),
            object: object.name,
            drop_statement: object.drop_statement(),
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for EnsureAbsentStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        ensure_absent(ctx.client.as_ref(), self.object, &self.drop_statement).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Move a storage table's data into `<table><suffix>`.
///
/// `CREATE TABLE b AS t` copies the structure only, so after the exchange
/// `t` is an empty table with the same schema and `b` holds the data. The
/// teardown that follows drops the empty one. A table that does not exist
/// has nothing to keep and is skipped.
pub(crate) struct BackupStep {
    name: String,
    object: &'static str,
    backup: String,
}

impl BackupStep {
    pub(crate) fn new(object: &PipelineObject, suffix: &str) -> Self {
        Self {
            name: format!("backup:{}", object.name),
            object: object.name,
            backup: format!("{}{suffix}", object.name),
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for BackupStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        // A detached table still has data worth keeping.
        if let Err(e) = ctx.client.execute(&format!("ATTACH TABLE {}", self.object)).await {
            tracing::debug!(object = %self.object, kind = %e.kind, "Pre-backup ATTACH ignored");
        }

        let exists = ctx
            .client
            .execute(&format!("EXISTS TABLE {}", self.object))
            .await
            .map_err(|e| QuoteflowError::schema(format!("EXISTS {}", self.object), e))?;
        if exists.trim() != "1" {
            tracing::info!(object = %self.object, "Backup skipped (absent)");
            return Ok(());
        }

        ctx.client
            .execute(&format!("CREATE TABLE {} AS {}", self.backup, self.object))
            .await
            .map_err(|e| QuoteflowError::schema(format!("CREATE {}", self.backup), e))?;
        ctx.client
            .execute(&format!("EXCHANGE TABLES {} AND {}", self.object, self.backup))
            .await
            .map_err(|e| {
                QuoteflowError::schema(format!("EXCHANGE {} {}", self.object, self.backup), e)
            })?;
        tracing::info!(object = %self.object, backup = %self.backup, "Backed up");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `DETACH TABLE IF EXISTS`. No-op for absent or already detached objects.
pub(crate) struct DetachStep {
    name: String,
    object: &'static str,
}

impl DetachStep {
    pub(crate) fn new(object: &PipelineObject) -> Self {
        Self {
            name: format!("detach:{}", object.name),
            object: object.name,
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for DetachStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        ctx.client
            .execute(&format!("DETACH TABLE IF EXISTS {}", self.object))
            .await
            .map_err(|e| QuoteflowError::schema(format!("DETACH {}", self.object), e))?;
        tracing::info!(object = %self.object, "DETACH ok");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Detach an object only if a [`RevealStep`] in the same plan attached it.
pub(crate) struct DetachRevealedStep {
    name: String,
    object: &'static str,
}

impl DetachRevealedStep {
    pub(crate) fn new(object: &PipelineObject) -> Self {
        Self {
            name: format!("conceal:{}", object.name),
            object: object.name,
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for DetachRevealedStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        if !ctx.take_revealed(self.object).await {
            tracing::debug!(object = %self.object, "Was visible before, leaving attached");
            return Ok(());
        }
        ctx.client
            .execute(&format!("DETACH TABLE {}", self.object))
            .await
            .map_err(|e| QuoteflowError::schema(format!("DETACH {}", self.object), e))?;
        tracing::info!(object = %self.object, "Restored to detached");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// What an [`AttachStep`] does when the attach cannot converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnFailure {
    /// Fail the plan.
    Abort,
    /// Log a warning with recovery instructions, record it in the plan
    /// metrics and carry on.
    Warn,
}

/// Attach with busy retry.
pub(crate) struct AttachStep {
    name: String,
    object: &'static str,
    on_failure: OnFailure,
}

impl AttachStep {
    pub(crate) fn new(object: &PipelineObject, on_failure: OnFailure) -> Self {
        Self {
            name: format!("attach:{}", object.name),
            object: object.name,
            on_failure,
        }
    }
}

#[async_trait]
impl PipelineTask<EngineCtx> for AttachStep {
    async fn run(self: Box<Self>, ctx: EngineCtx) -> QuoteflowResult<()> {
        let result = attach_with_retry(ctx.client.as_ref(), self.object, &ctx.retry).await;

        let e = match (result, self.on_failure) {
            (Ok(outcome), _) => {
                tracing::info!(object = %self.object, attempts = outcome.attempts(), "Attached");
                return Ok(());
            }
            (Err(e), OnFailure::Abort) => return Err(e),
            (Err(e), OnFailure::Warn) => e,
        };

        // ATTACH can't bring back an object that is gone; it has to be rebuilt.
        let warning = if e.store_error().is_some_and(|s| s.is_not_found()) {
            format!(
                "{} does not exist, pipeline is broken. Run `quoteflow init` or \
                 `quoteflow recreate --only-adapter` to rebuild it",
                self.object
            )
        } else {
            format!(
                "{} not re-attached ({e}), pipeline is broken. Run manually: ATTACH TABLE {}",
                self.object, self.object
            )
        };
        tracing::warn!(object = %self.object, "{warning}");
        ctx.warn(warning).await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
