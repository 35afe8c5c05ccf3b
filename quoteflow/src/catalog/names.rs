//! Object names and fixed identifiers of the pipeline topology.
//!
//! Centralized so DDL templates, plans, and tests agree on spelling.

/// Storage tables
pub mod tables {
    /// Raw ticks, one row per quote event.
    pub const QUOTES: &str = "quotes";

    /// Candles pre-aggregated per timeframe.
    pub const OHLC: &str = "ohlc";
}

/// Kafka engine adapter tables
pub mod adapters {
    /// Realtime topic consumer.
    pub const QUOTES: &str = "kafka_quotes";

    /// History topic consumer.
    pub const QUOTES_HISTORY: &str = "kafka_quotes_history";

    /// History topic producer. Written to by backfill jobs, never consumed.
    pub const QUOTES_HISTORY_PRODUCER: &str = "kafka_quotes_history_producer";
}

/// Materialized views
pub mod views {
    pub const KAFKA_QUOTES_TO_QUOTES: &str = "mv_kafka_quotes_to_quotes";

    pub const KAFKA_QUOTES_HISTORY_TO_QUOTES: &str = "mv_kafka_quotes_history_to_quotes";

    /// Rollup view: quotes -> ohlc.
    pub const QUOTES_TO_OHLC: &str = "mv_quotes_to_ohlc";
}

/// Kafka consumer group names used by the adapter tables
pub mod groups {
    pub const QUOTES: &str = "clickhouse_quotes";

    pub const QUOTES_HISTORY: &str = "clickhouse_quotes_history";

    pub const QUOTES_HISTORY_PRODUCER: &str = "clickhouse_quotes_history-producer";
}

/// Rollup timeframes and their bucket width in milliseconds.
pub const TIMEFRAMES: &[(&str, u64)] = &[
    ("1s", 1_000),
    ("1m", 60_000),
    ("5m", 300_000),
    ("15m", 900_000),
    ("30m", 1_800_000),
    ("1h", 3_600_000),
    ("4h", 14_400_000),
    ("1d", 86_400_000),
    ("1w", 604_800_000),
    ("1y", 31_536_000_000),
];

/// Whether `tf` is one of the rollup timeframes.
pub fn is_timeframe(tf: &str) -> bool {
    TIMEFRAMES.iter().any(|(name, _)| *name == tf)
}
