//! DDL bodies for every catalog object.
//!
//! Each function returns the part of the statement that follows the object
//! name. [`PipelineObject::create_statement`](super::PipelineObject::create_statement)
//! prepends `CREATE ... [IF NOT EXISTS] <name>`, so the same body backs both
//! idempotent and strict creation.

use super::AdapterSettings;
use super::names::{TIMEFRAMES, tables};
use crate::sql::quote_literal;

pub(super) fn quotes_table() -> String {
    r#"(
    ts     DateTime64(3),
    symbol String,
    bid    Float64,
    ask    Float64
) ENGINE = ReplacingMergeTree()
ORDER BY (symbol, ts)"#
        .to_string()
}

pub(super) fn ohlc_table() -> String {
    r#"(
    tf     LowCardinality(String),
    symbol LowCardinality(String),
    ts     DateTime64(3, 'UTC'),
    open   AggregateFunction(argMin, Float64, DateTime64(3, 'UTC')),
    high   AggregateFunction(max, Float64),
    low    AggregateFunction(min, Float64),
    close  AggregateFunction(argMax, Float64, DateTime64(3, 'UTC')),
    volume AggregateFunction(count)
) ENGINE = AggregatingMergeTree()
ORDER BY (tf, symbol, ts)"#
        .to_string()
}

/// Columns of the realtime adapter. Event time comes from the message timestamp.
const REALTIME_COLUMNS: &str = r#"(
    symbol String,
    bid    Float64,
    ask    Float64
)"#;

/// Columns of the history adapters. Event time travels in the payload.
const HISTORY_COLUMNS: &str = r#"(
    symbol String,
    bid    Float64,
    ask    Float64,
    ts_ms  UInt64
)"#;

pub(super) fn realtime_adapter(settings: &AdapterSettings, group: &str) -> String {
    adapter_table(REALTIME_COLUMNS, settings, &settings.topic_realtime, group)
}

pub(super) fn history_adapter(settings: &AdapterSettings, group: &str) -> String {
    adapter_table(HISTORY_COLUMNS, settings, &settings.topic_history, group)
}

fn adapter_table(columns: &str, settings: &AdapterSettings, topic: &str, group: &str) -> String {
    format!(
        "{columns} ENGINE = Kafka()
SETTINGS
    kafka_broker_list = {broker},
    kafka_topic_list = {topic},
    kafka_group_name = {group},
    kafka_format = 'JSONEachRow',
    kafka_skip_broken_messages = 10,
    kafka_security_protocol = {protocol},
    kafka_sasl_mechanism = 'PLAIN',
    kafka_sasl_username = {user},
    kafka_sasl_password = {password}",
        broker = quote_literal(&settings.broker),
        topic = quote_literal(topic),
        group = quote_literal(group),
        protocol = quote_literal(&settings.security_protocol),
        user = quote_literal(&settings.user),
        password = quote_literal(&settings.password),
    )
}

pub(super) fn realtime_ingest_view(source: &str) -> String {
    format!(
        "SELECT
    coalesce(_timestamp_ms, now64(3)) AS ts,
    symbol, bid, ask
FROM {source}"
    )
}

pub(super) fn history_ingest_view(source: &str) -> String {
    format!(
        "SELECT fromUnixTimestamp64Milli(ts_ms) AS ts, symbol, bid, ask
FROM {source}"
    )
}

/// Rollup view body: one candle state per (timeframe, symbol, bucket).
pub(super) fn rollup_view() -> String {
    let intervals = TIMEFRAMES
        .iter()
        .map(|(_, ms)| ms.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let names = TIMEFRAMES
        .iter()
        .map(|(tf, _)| quote_literal(tf))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "SELECT tf, symbol, bucket AS ts, open, high, low, close, volume
FROM (
    SELECT
        tf, symbol,
        fromUnixTimestamp64Milli(
            intDiv(toUnixTimestamp64Milli(ts), interval_ms) * interval_ms
        ) AS bucket,
        argMinState(bid, ts) AS open,
        maxState(bid) AS high,
        minState(bid) AS low,
        argMaxState(bid, ts) AS close,
        countState() AS volume
    FROM {source}
    ARRAY JOIN
        [{intervals}] AS interval_ms,
        [{names}] AS tf
    GROUP BY tf, symbol, bucket
)",
        source = tables::QUOTES,
    )
}
