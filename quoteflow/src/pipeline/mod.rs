//! Table-driven plan execution.
//!
//! Every schema-changing command is expressed as an [`ExecutionPlan`]: an
//! ordered list of named stages, each holding an ordered list of steps.
//! Plans are plain data built up front, so the exact statement sequence of a
//! command can be inspected before anything touches the store.
//!
//! ## Architecture
//!
//! ```text
//! ExecutionPlan → Stages → Steps
//!
//! - ExecutionPlan: ordered stages, built per command and scope
//! - Stage: named group of steps, run one after another
//! - Step: one unit of work, usually one or two statements
//! ```
//!
//! The store is a shared, continuously-mutating resource, so there is no
//! parallel stage mode: exactly one request is in flight at any time. A
//! failing step aborts the plan; everything before it stays applied.
//!
//! ## Example
//!
//! ```ignore
//! let plan = ExecutionPlan::new(vec![
//!     Stage::sequential("storage", vec![Box::new(CreateStep::new(quotes, mode))]),
//!     Stage::sequential("views", vec![Box::new(CreateStep::new(rollup, mode))]),
//! ]);
//! let metrics = PipelineExecutor::execute(plan, ctx).await?;
//! println!("plan took {}ms", metrics.total_duration_ms);
//! ```

mod metrics;
mod plan;
mod stage;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
pub use plan::{ExecutionPlan, PipelineExecutor};
pub use stage::Stage;
pub use task::{BoxedTask, PipelineTask};
