//! Stage definition for table-driven plans.

/// A named group of steps executed in order.
///
/// Generic over the step type so plans can be assembled and inspected
/// without a context.
#[derive(Debug, Clone)]
pub struct Stage<T> {
    pub name: &'static str,
    pub tasks: Vec<T>,
}

impl<T> Stage<T> {
    /// Create a stage whose steps run one after another.
    pub fn sequential(name: &'static str, tasks: Vec<T>) -> Self {
        Self { name, tasks }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
