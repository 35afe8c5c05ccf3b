//! Operation scopes selected on the command line.

use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use std::fmt;

/// Subset of the catalog a Recreate touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeFilter {
    /// Every object.
    #[default]
    All,
    /// Adapter tables and the views they feed.
    AdapterOnly,
    /// Storage tables and the rollup view.
    StorageOnly,
    /// Views only.
    ViewsOnly,
}

impl ScopeFilter {
    /// Build from the three mutually exclusive `--only-*` flags.
    pub fn from_flags(
        only_adapter: bool,
        only_storage: bool,
        only_views: bool,
    ) -> QuoteflowResult<Self> {
        match (only_adapter, only_storage, only_views) {
            (false, false, false) => Ok(Self::All),
            (true, false, false) => Ok(Self::AdapterOnly),
            (false, true, false) => Ok(Self::StorageOnly),
            (false, false, true) => Ok(Self::ViewsOnly),
            _ => Err(QuoteflowError::Validation(
                "--only-adapter, --only-storage, --only-views are mutually exclusive".into(),
            )),
        }
    }

    /// Whether storage tables are replaced.
    pub fn includes_storage(self) -> bool {
        matches!(self, Self::All | Self::StorageOnly)
    }

    /// Whether adapter tables are replaced.
    pub fn includes_adapters(self) -> bool {
        matches!(self, Self::All | Self::AdapterOnly)
    }

    /// Whether every view is replaced regardless of its source.
    pub fn includes_all_views(self) -> bool {
        matches!(self, Self::All | Self::ViewsOnly)
    }
}

impl fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "all objects",
            Self::AdapterOnly => "adapter tables + adapter views",
            Self::StorageOnly => "storage tables + rollup view",
            Self::ViewsOnly => "views only",
        };
        f.write_str(s)
    }
}

/// Tables a Clean deletes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanTarget {
    #[default]
    Both,
    RawOnly,
    RollupOnly,
}

impl CleanTarget {
    pub fn from_flags(only_raw: bool, only_rollup: bool) -> QuoteflowResult<Self> {
        match (only_raw, only_rollup) {
            (false, false) => Ok(Self::Both),
            (true, false) => Ok(Self::RawOnly),
            (false, true) => Ok(Self::RollupOnly),
            (true, true) => Err(QuoteflowError::Validation(
                "--only-raw and --only-rollup are mutually exclusive".into(),
            )),
        }
    }

    pub fn includes_raw(self) -> bool {
        matches!(self, Self::Both | Self::RawOnly)
    }

    pub fn includes_rollup(self) -> bool {
        matches!(self, Self::Both | Self::RollupOnly)
    }
}

impl fmt::Display for CleanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Both => "quotes + ohlc",
            Self::RawOnly => "quotes only",
            Self::RollupOnly => "ohlc only",
        };
        f.write_str(s)
    }
}
