//! Step trait for plan execution.

use async_trait::async_trait;
use quoteflow_shared::errors::QuoteflowResult;

/// A unit of work inside a stage.
///
/// Steps run with a shared context, which is cloned per step. Use interior
/// mutability in the context for anything a later step needs to read.
#[async_trait]
pub trait PipelineTask<Ctx>: Send + Sync {
    /// Run the step against the shared context.
    async fn run(self: Box<Self>, ctx: Ctx) -> QuoteflowResult<()>;

    /// Human-readable name for logs and metrics, e.g. `create:quotes`.
    fn name(&self) -> &str;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;
