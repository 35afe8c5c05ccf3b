//! In-memory store used by unit tests.
//!
//! Models the three visibility states of an object and answers the
//! statements the engine emits with the same diagnostics the real store
//! returns, so error classification is exercised end to end:
//!
//! - `ATTACH` on an attached object fails with "already exists"
//! - `ATTACH` on an absent object fails with "doesn't exist"
//! - `DROP ... IF EXISTS` cannot see a detached object and leaves it alone
//! - `CREATE` of a detached name fails with "already exists (detached)"
//! - creating a view requires its source and target to be attached
//! - `EXCHANGE TABLES` swaps definitions and row counts of two attached tables

use crate::catalog::{AdapterSettings, CreateMode, ObjectCatalog};
use crate::client::ExecutionClient;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use quoteflow_shared::StoreError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Retry policy without sleeps.
pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(10, Duration::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectState {
    Absent,
    Attached,
    Detached,
}

#[derive(Debug, Clone)]
struct Entry {
    state: ObjectState,
    definition: String,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, Entry>,
    /// view -> (source, target)
    dependencies: HashMap<String, (String, String)>,
    busy_attaches: HashMap<String, u32>,
    row_counts: HashMap<String, u64>,
    failures: Vec<(String, String)>,
    log: Vec<String>,
}

pub(crate) struct SimulatedStore {
    inner: Mutex<Inner>,
}

fn not_found(name: &str) -> StoreError {
    StoreError::new(format!(
        "Code: 60. DB::Exception: Table default.{name} doesn't exist. (UNKNOWN_TABLE)"
    ))
}

fn already_exists(name: &str) -> StoreError {
    StoreError::new(format!(
        "Code: 57. DB::Exception: Table default.{name} already exists. (TABLE_ALREADY_EXISTS)"
    ))
}

fn busy(name: &str) -> StoreError {
    StoreError::new(format!(
        "Code: 473. DB::Exception: Table default.{name} is still used by some query. (DEADLOCK_AVOIDED)"
    ))
}

impl SimulatedStore {
    /// Store with no objects.
    pub(crate) fn empty() -> Self {
        let catalog = ObjectCatalog::new(&AdapterSettings::default());
        let dependencies = catalog
            .objects()
            .iter()
            .filter_map(|o| {
                Some((
                    o.name.to_string(),
                    (o.reads_from?.to_string(), o.produces_into?.to_string()),
                ))
            })
            .collect();

        Self {
            inner: Mutex::new(Inner {
                dependencies,
                ..Inner::default()
            }),
        }
    }

    /// Store with every catalog object attached.
    pub(crate) fn with_pipeline() -> Self {
        let store = Self::empty();
        let catalog = ObjectCatalog::new(&AdapterSettings::default());
        {
            let mut inner = store.inner.lock().unwrap();
            for object in catalog.objects() {
                inner.objects.insert(
                    object.name.to_string(),
                    Entry {
                        state: ObjectState::Attached,
                        definition: object.create_statement(CreateMode::Strict),
                    },
                );
            }
        }
        store
    }

    pub(crate) fn set_state(&self, name: &str, state: ObjectState) {
        let mut inner = self.inner.lock().unwrap();
        match state {
            ObjectState::Absent => {
                inner.objects.remove(name);
            }
            _ => {
                let entry = inner.objects.entry(name.to_string()).or_insert(Entry {
                    state,
                    definition: String::new(),
                });
                entry.state = state;
            }
        }
    }

    pub(crate) fn detach_directly(&self, name: &str) {
        self.set_state(name, ObjectState::Detached);
    }

    /// Fail the next `times` ATTACH statements for `name` with the busy signature.
    pub(crate) fn fail_attach_busy(&self, name: &str, times: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.busy_attaches.insert(name.to_string(), times);
    }

    pub(crate) fn set_row_count(&self, table: &str, rows: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.row_counts.insert(table.to_string(), rows);
    }

    /// Fail every statement starting with `prefix` with `message`.
    pub(crate) fn fail_statement(&self, prefix: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .failures
            .push((prefix.to_string(), message.to_string()));
    }

    pub(crate) fn row_count(&self, table: &str) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.row_counts.get(table).copied().unwrap_or(0)
    }

    pub(crate) fn state(&self, name: &str) -> ObjectState {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(name)
            .map(|e| e.state)
            .unwrap_or(ObjectState::Absent)
    }

    pub(crate) fn is_attached(&self, name: &str) -> bool {
        self.state(name) == ObjectState::Attached
    }

    pub(crate) fn definition(&self, name: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.objects.get(name).map(|e| e.definition.clone())
    }

    /// Every statement received, in order.
    pub(crate) fn statements(&self) -> Vec<String> {
        self.inner.lock().unwrap().log.clone()
    }

    pub(crate) fn count_statements(&self, exact: &str) -> usize {
        self.statements().iter().filter(|s| s.as_str() == exact).count()
    }

    pub(crate) fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.starts_with(prefix))
            .collect()
    }

    /// Position of the first statement starting with `prefix`.
    pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
        self.statements().iter().position(|s| s.starts_with(prefix))
    }

    pub(crate) fn clear_log(&self) {
        self.inner.lock().unwrap().log.clear();
    }
}

impl Inner {
    fn state(&self, name: &str) -> ObjectState {
        self.objects
            .get(name)
            .map(|e| e.state)
            .unwrap_or(ObjectState::Absent)
    }

    fn apply(&mut self, statement: &str) -> Result<String, StoreError> {
        if let Some((_, message)) = self
            .failures
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
        {
            return Err(StoreError::new(message.clone()));
        }

        let tokens: Vec<&str> = statement.split_whitespace().collect();
        match tokens.as_slice() {
            ["SELECT", "1"] => Ok("1".into()),
            ["SELECT", "name,", ..] if statement.contains("system.tables") => {
                Ok(self.system_tables())
            }
            ["SELECT", "count()", "FROM", table, ..] => self.count(table),
            ["ATTACH", "TABLE", name] => self.attach(name),
            ["DETACH", "TABLE", "IF", "EXISTS", name] => {
                self.detach(name);
                Ok(String::new())
            }
            ["DETACH", "TABLE", name] => {
                if self.state(name) == ObjectState::Attached {
                    self.detach(name);
                    Ok(String::new())
                } else {
                    Err(not_found(name))
                }
            }
            ["DROP", "TABLE" | "VIEW", "IF", "EXISTS", name] => {
                if self.state(name) == ObjectState::Attached {
                    self.objects.remove(*name);
                }
                Ok(String::new())
            }
            ["EXISTS", "TABLE", name] => Ok(if self.state(name) == ObjectState::Attached {
                "1\n".into()
            } else {
                "0\n".into()
            }),
            ["EXCHANGE", "TABLES", a, "AND", b] => self.exchange(a, b),
            ["CREATE", "TABLE", name, "AS", source] => {
                let definition = match self.objects.get(*source) {
                    Some(entry) if entry.state == ObjectState::Attached => entry.definition.clone(),
                    _ => return Err(not_found(source)),
                };
                self.create(name, &definition, false)
            }
            ["CREATE", "TABLE", "IF", "NOT", "EXISTS", name, ..]
            | ["CREATE", "MATERIALIZED", "VIEW", "IF", "NOT", "EXISTS", name, ..] => {
                self.create(name, statement, true)
            }
            ["CREATE", "TABLE", name, ..] | ["CREATE", "MATERIALIZED", "VIEW", name, ..] => {
                self.create(name, statement, false)
            }
            ["DELETE", "FROM", table, ..] => {
                if self.state(table) != ObjectState::Attached {
                    return Err(not_found(table));
                }
                self.row_counts.insert(table.to_string(), 0);
                Ok(String::new())
            }
            _ => Err(StoreError::new(format!(
                "Code: 62. DB::Exception: Syntax error: {statement}"
            ))),
        }
    }

    fn attach(&mut self, name: &str) -> Result<String, StoreError> {
        if let Some(remaining) = self.busy_attaches.get_mut(name)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(busy(name));
        }
        match self.state(name) {
            ObjectState::Detached => {
                if let Some(entry) = self.objects.get_mut(name) {
                    entry.state = ObjectState::Attached;
                }
                Ok(String::new())
            }
            ObjectState::Attached => Err(already_exists(name)),
            ObjectState::Absent => Err(not_found(name)),
        }
    }

    fn detach(&mut self, name: &str) {
        if let Some(entry) = self.objects.get_mut(name)
            && entry.state == ObjectState::Attached
        {
            entry.state = ObjectState::Detached;
        }
    }

    fn create(
        &mut self,
        name: &str,
        statement: &str,
        if_not_exists: bool,
    ) -> Result<String, StoreError> {
        match self.state(name) {
            ObjectState::Attached if if_not_exists => return Ok(String::new()),
            ObjectState::Attached => return Err(already_exists(name)),
            ObjectState::Detached => {
                return Err(StoreError::new(format!(
                    "Code: 57. DB::Exception: Table default.{name} already exists (detached). (TABLE_ALREADY_EXISTS)"
                )));
            }
            ObjectState::Absent => {}
        }

        if let Some((source, target)) = self.dependencies.get(name) {
            for dependency in [source, target] {
                if self.state(dependency) != ObjectState::Attached {
                    return Err(not_found(dependency));
                }
            }
        }

        self.objects.insert(
            name.to_string(),
            Entry {
                state: ObjectState::Attached,
                definition: statement.replacen("IF NOT EXISTS ", "", 1),
            },
        );
        Ok(String::new())
    }

    fn exchange(&mut self, a: &str, b: &str) -> Result<String, StoreError> {
        for name in [a, b] {
            if self.state(name) != ObjectState::Attached {
                return Err(not_found(name));
            }
        }
        let first = self.objects.remove(a);
        let second = self.objects.remove(b);
        if let (Some(first), Some(second)) = (first, second) {
            self.objects.insert(a.to_string(), second);
            self.objects.insert(b.to_string(), first);
        }
        let first_rows = self.row_counts.remove(a).unwrap_or(0);
        let second_rows = self.row_counts.remove(b).unwrap_or(0);
        self.row_counts.insert(a.to_string(), second_rows);
        self.row_counts.insert(b.to_string(), first_rows);
        Ok(String::new())
    }

    fn count(&self, table: &str) -> Result<String, StoreError> {
        if self.state(table) != ObjectState::Attached {
            return Err(not_found(table));
        }
        Ok(self.row_counts.get(table).copied().unwrap_or(0).to_string())
    }

    fn system_tables(&self) -> String {
        let mut names: Vec<&String> = self
            .objects
            .iter()
            .filter(|(_, e)| e.state == ObjectState::Attached)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        names
            .into_iter()
            .map(|name| {
                let definition = &self.objects[name].definition;
                let engine = if definition.starts_with("CREATE MATERIALIZED VIEW") {
                    "MaterializedView"
                } else if definition.contains("ENGINE = Kafka") {
                    "Kafka"
                } else if definition.contains("AggregatingMergeTree") {
                    "AggregatingMergeTree"
                } else {
                    "ReplacingMergeTree"
                };
                let rows = if engine.ends_with("MergeTree") {
                    format!(
                        "\"{}\"",
                        self.row_counts.get(name.as_str()).copied().unwrap_or(0)
                    )
                } else {
                    "null".to_string()
                };
                format!(r#"{{"name":"{name}","engine":"{engine}","total_rows":{rows}}}"#)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl ExecutionClient for SimulatedStore {
    async fn execute(&self, command: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.push(command.to_string());
        inner.apply(command)
    }
}
