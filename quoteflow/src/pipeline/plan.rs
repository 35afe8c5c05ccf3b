//! Plan and executor.

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
use super::stage::Stage;
use super::task::BoxedTask;
use quoteflow_shared::errors::QuoteflowResult;
use std::time::Instant;

pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    /// Build a plan. Empty stages are dropped so they don't show up in
    /// logs or metrics.
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        let stages = stages.into_iter().filter(|s| !s.is_empty()).collect();
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage<BoxedTask<Ctx>>] {
        &self.stages
    }

    /// Step names in execution order.
    pub fn task_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter())
            .map(|task| task.name())
            .collect()
    }

    pub fn into_stages(self) -> Vec<Stage<BoxedTask<Ctx>>> {
        self.stages
    }
}

/// Runs an [`ExecutionPlan`] stage by stage, step by step.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a plan.
    ///
    /// Stops at the first failing step and returns its error. Steps that
    /// already ran are not rolled back.
    ///
    /// Generic over:
    /// - `Ctx`: Shared plan context (use interior mutability for writes)
    pub async fn execute<Ctx>(plan: ExecutionPlan<Ctx>, ctx: Ctx) -> QuoteflowResult<PipelineMetrics>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::new();

        for (index, stage) in plan.into_stages().into_iter().enumerate() {
            let stage_start = Instant::now();
            tracing::info!(stage = stage.name, steps = stage.tasks.len(), "Stage started");

            let mut task_metrics = Vec::new();
            for task in stage.tasks {
                let name = task.name().to_string();
                let task_start = Instant::now();
                if let Err(e) = task.run(ctx.clone()).await {
                    tracing::error!(stage = stage.name, step = %name, error = %e, "Step failed");
                    return Err(e);
                }
                task_metrics.push(TaskMetrics {
                    name,
                    duration_ms: task_start.elapsed().as_millis(),
                });
            }

            let duration_ms = stage_start.elapsed().as_millis();
            tracing::debug!(stage = stage.name, duration_ms, "Stage finished");
            stage_metrics.push(StageMetrics {
                index,
                name: stage.name,
                duration_ms,
                tasks: task_metrics,
            });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            stages: stage_metrics,
            warnings: Vec::new(),
        })
    }
}
