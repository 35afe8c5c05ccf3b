//! Declarative description of the pipeline objects.
//!
//! ## Topology
//!
//! ```text
//! kafka_quotes ─────────→ mv_kafka_quotes_to_quotes ─────────┐
//!                                                            ├─→ quotes ─→ mv_quotes_to_ohlc ─→ ohlc
//! kafka_quotes_history ─→ mv_kafka_quotes_history_to_quotes ─┘
//!
//! kafka_quotes_history_producer   (write-only, never consumed)
//! ```
//!
//! The catalog lists objects in creation order: storage tables, adapter
//! tables, adapter views, rollup view. Drop order is the exact reverse.
//! Adapter views come before the rollup view on create (and after it on
//! drop) even for a full scope; that ordering is kept as-is.

mod ddl;
pub mod names;

use crate::scope::ScopeFilter;
use std::fmt;

/// Kind of a pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Append-oriented store of individual events.
    RawTable,
    /// Pre-aggregated table fed by a view over the raw table.
    RollupTable,
    /// Schema-only binding to a message-queue topic.
    AdapterTable,
    /// Standing query moving rows from a source into a target.
    View,
}

impl ObjectKind {
    pub fn is_storage(self) -> bool {
        matches!(self, Self::RawTable | Self::RollupTable)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RawTable => "raw table",
            Self::RollupTable => "rollup table",
            Self::AdapterTable => "adapter table",
            Self::View => "view",
        };
        f.write_str(s)
    }
}

/// Role of an adapter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterRole {
    /// Pulled from by background consumers. Kept detached until armed.
    Consumer,
    /// Only written to. Stays attached.
    Producer,
}

/// How a CREATE statement treats an existing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// `CREATE ... IF NOT EXISTS`
    IfNotExists,
    /// Plain `CREATE`; an existing object is an error.
    Strict,
}

/// Message-queue connection parameters baked into adapter DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    /// Broker address as seen from the store.
    pub broker: String,
    pub user: String,
    pub password: String,
    pub security_protocol: String,
    pub topic_realtime: String,
    pub topic_history: String,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            broker: "kafka:9092".into(),
            user: String::new(),
            password: String::new(),
            security_protocol: "SASL_PLAINTEXT".into(),
            topic_realtime: "quotes".into(),
            topic_history: "quotes_history".into(),
        }
    }
}

/// One object of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineObject {
    pub name: &'static str,
    pub kind: ObjectKind,
    /// Source object, for views.
    pub reads_from: Option<&'static str>,
    /// Target object, for views.
    pub produces_into: Option<&'static str>,
    /// Set for adapter tables only.
    pub role: Option<AdapterRole>,
    body: String,
}

impl PipelineObject {
    fn table(name: &'static str, kind: ObjectKind, body: String) -> Self {
        Self {
            name,
            kind,
            reads_from: None,
            produces_into: None,
            role: None,
            body,
        }
    }

    fn adapter(name: &'static str, role: AdapterRole, body: String) -> Self {
        Self {
            role: Some(role),
            ..Self::table(name, ObjectKind::AdapterTable, body)
        }
    }

    fn view(name: &'static str, source: &'static str, target: &'static str, body: String) -> Self {
        Self {
            name,
            kind: ObjectKind::View,
            reads_from: Some(source),
            produces_into: Some(target),
            role: None,
            body,
        }
    }

    pub fn is_consumer(&self) -> bool {
        self.role == Some(AdapterRole::Consumer)
    }

    /// Full CREATE statement.
    pub fn create_statement(&self, mode: CreateMode) -> String {
        let guard = match mode {
            CreateMode::IfNotExists => "IF NOT EXISTS ",
            CreateMode::Strict => "",
        };
        match (self.kind, self.produces_into) {
            (ObjectKind::View, Some(target)) => format!(
                "CREATE MATERIALIZED VIEW {guard}{name} TO {target} AS\n{body}",
                name = self.name,
                body = self.body,
            ),
            _ => format!(
                "CREATE TABLE {guard}{name} {body}",
                name = self.name,
                body = self.body,
            ),
        }
    }

    /// Guarded DROP statement; a no-op when the object is absent.
    pub fn drop_statement(&self) -> String {
        match self.kind {
            ObjectKind::View => format!("DROP VIEW IF EXISTS {}", self.name),
            _ => format!("DROP TABLE IF EXISTS {}", self.name),
        }
    }
}

/// Static catalog of the pipeline, in dependency order.
#[derive(Debug, Clone)]
pub struct ObjectCatalog {
    objects: Vec<PipelineObject>,
}

impl ObjectCatalog {
    pub fn new(settings: &AdapterSettings) -> Self {
        use names::{adapters, groups, tables, views};

        let objects = vec![
            PipelineObject::table(tables::QUOTES, ObjectKind::RawTable, ddl::quotes_table()),
            PipelineObject::table(tables::OHLC, ObjectKind::RollupTable, ddl::ohlc_table()),
            PipelineObject::adapter(
                adapters::QUOTES,
                AdapterRole::Consumer,
                ddl::realtime_adapter(settings, groups::QUOTES),
            ),
            PipelineObject::adapter(
                adapters::QUOTES_HISTORY,
                AdapterRole::Consumer,
                ddl::history_adapter(settings, groups::QUOTES_HISTORY),
            ),
            PipelineObject::adapter(
                adapters::QUOTES_HISTORY_PRODUCER,
                AdapterRole::Producer,
                ddl::history_adapter(settings, groups::QUOTES_HISTORY_PRODUCER),
            ),
            PipelineObject::view(
                views::KAFKA_QUOTES_TO_QUOTES,
                adapters::QUOTES,
                tables::QUOTES,
                ddl::realtime_ingest_view(adapters::QUOTES),
            ),
            PipelineObject::view(
                views::KAFKA_QUOTES_HISTORY_TO_QUOTES,
                adapters::QUOTES_HISTORY,
                tables::QUOTES,
                ddl::history_ingest_view(adapters::QUOTES_HISTORY),
            ),
            PipelineObject::view(
                views::QUOTES_TO_OHLC,
                tables::QUOTES,
                tables::OHLC,
                ddl::rollup_view(),
            ),
        ];

        Self { objects }
    }

    /// All objects in creation order.
    pub fn objects(&self) -> &[PipelineObject] {
        &self.objects
    }

    pub fn get(&self, name: &str) -> Option<&PipelineObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn kind_of(&self, name: &str) -> Option<ObjectKind> {
        self.get(name).map(|o| o.kind)
    }

    /// Whether `object` belongs to `scope`.
    ///
    /// Views belong to every scope that includes their source object, so a
    /// rebuilt adapter takes its views with it, and rebuilt storage takes
    /// the rollup view with it.
    pub fn includes(&self, object: &PipelineObject, scope: ScopeFilter) -> bool {
        match object.kind {
            ObjectKind::RawTable | ObjectKind::RollupTable => scope.includes_storage(),
            ObjectKind::AdapterTable => scope.includes_adapters(),
            ObjectKind::View => {
                scope.includes_all_views()
                    || match object.reads_from.and_then(|s| self.kind_of(s)) {
                        Some(kind) if kind.is_storage() => scope.includes_storage(),
                        Some(ObjectKind::AdapterTable) => scope.includes_adapters(),
                        _ => false,
                    }
            }
        }
    }

    /// In-scope objects, creation order.
    pub fn create_order(&self, scope: ScopeFilter) -> Vec<&PipelineObject> {
        self.objects
            .iter()
            .filter(|o| self.includes(o, scope))
            .collect()
    }

    /// In-scope objects, exact reverse of creation order.
    pub fn drop_order(&self, scope: ScopeFilter) -> Vec<&PipelineObject> {
        let mut objects = self.create_order(scope);
        objects.reverse();
        objects
    }

    /// Views outside `scope` that write into storage replaced by `scope`.
    ///
    /// These must be detached before the storage is dropped and reattached
    /// once it is recreated.
    pub fn guard_views(&self, scope: ScopeFilter) -> Vec<&PipelineObject> {
        self.objects
            .iter()
            .filter(|o| o.kind == ObjectKind::View && !self.includes(o, scope))
            .filter(|o| {
                o.produces_into
                    .and_then(|t| self.get(t))
                    .is_some_and(|t| t.kind.is_storage() && self.includes(t, scope))
            })
            .collect()
    }

    /// Adapter tables feeding in-scope views without being in scope
    /// themselves. They must be visible while those views are created.
    pub fn out_of_scope_sources(&self, scope: ScopeFilter) -> Vec<&PipelineObject> {
        let mut sources: Vec<&PipelineObject> = Vec::new();
        for view in self
            .create_order(scope)
            .into_iter()
            .filter(|o| o.kind == ObjectKind::View)
        {
            if let Some(source) = view.reads_from.and_then(|s| self.get(s))
                && source.kind == ObjectKind::AdapterTable
                && !self.includes(source, scope)
                && !sources.iter().any(|s| s.name == source.name)
            {
                sources.push(source);
            }
        }
        sources
    }

    /// Consumer adapter tables, creation order.
    pub fn consumer_adapters(&self) -> impl Iterator<Item = &PipelineObject> {
        self.objects.iter().filter(|o| o.is_consumer())
    }

    fn first_of(&self, kind: ObjectKind) -> Option<&PipelineObject> {
        self.objects.iter().find(|o| o.kind == kind)
    }

    pub fn raw_table(&self) -> Option<&PipelineObject> {
        self.first_of(ObjectKind::RawTable)
    }

    pub fn rollup_table(&self) -> Option<&PipelineObject> {
        self.first_of(ObjectKind::RollupTable)
    }

    /// The view producing into the rollup table.
    pub fn rollup_view(&self) -> Option<&PipelineObject> {
        let rollup = self.rollup_table()?.name;
        self.objects
            .iter()
            .find(|o| o.kind == ObjectKind::View && o.produces_into == Some(rollup))
    }
}
