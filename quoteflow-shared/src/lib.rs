//! Types shared across quoteflow crates.

pub mod errors;
pub mod store;

pub use errors::{QuoteflowError, QuoteflowResult};
pub use store::{StoreError, StoreErrorKind};
