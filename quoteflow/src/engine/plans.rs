//! Execution plans per command.

use super::EngineCtx;
use super::steps::{
    AttachStep, BackupStep, CreateStep, DetachRevealedStep, DetachStep, EnsureAbsentStep, OnFailure,
    RevealStep,
};
use crate::catalog::{CreateMode, ObjectCatalog, ObjectKind, PipelineObject};
use crate::pipeline::{BoxedTask, ExecutionPlan, Stage};
use crate::scope::ScopeFilter;

fn each<'a, I, F>(objects: I, step: F) -> Vec<BoxedTask<EngineCtx>>
where
    I: IntoIterator<Item = &'a PipelineObject>,
    F: Fn(&PipelineObject) -> BoxedTask<EngineCtx>,
{
    objects.into_iter().map(step).collect()
}

fn of_kind(catalog: &ObjectCatalog, pred: fn(ObjectKind) -> bool) -> Vec<&PipelineObject> {
    catalog.objects().iter().filter(|o| pred(o.kind)).collect()
}

/// Idempotent creation of the whole pipeline.
pub fn init_plan(catalog: &ObjectCatalog) -> ExecutionPlan<EngineCtx> {
    let mode = CreateMode::IfNotExists;

    // A previous partial run may have left an adapter detached, where the
    // guarded CREATE can't see it. Reveal it first.
    let adapters = of_kind(catalog, |k| k == ObjectKind::AdapterTable)
        .into_iter()
        .flat_map(|o| -> [BoxedTask<EngineCtx>; 2] {
            [Box::new(RevealStep::new(o)), Box::new(CreateStep::new(o, mode))]
        })
        .collect();

    ExecutionPlan::new(vec![
        Stage::sequential(
            "storage",
            each(of_kind(catalog, ObjectKind::is_storage), |o| {
                Box::new(CreateStep::new(o, mode))
            }),
        ),
        Stage::sequential("adapters", adapters),
        Stage::sequential(
            "views",
            each(of_kind(catalog, |k| k == ObjectKind::View), |o| {
                Box::new(CreateStep::new(o, mode))
            }),
        ),
        Stage::sequential(
            "disarm",
            each(catalog.consumer_adapters(), |o| Box::new(DetachStep::new(o))),
        ),
    ])
}

/// Drop-and-create of the objects selected by `scope`.
///
/// With `backup_suffix`, in-scope storage tables are swapped out to
/// `<table><suffix>` right before the first of them is torn down, once
/// every view reading from them is already gone.
///
/// Stages that do not apply to `scope` come out empty and are skipped.
pub fn recreate_plan(
    catalog: &ObjectCatalog,
    scope: ScopeFilter,
    backup_suffix: Option<&str>,
) -> ExecutionPlan<EngineCtx> {
    let guard_views = catalog.guard_views(scope);
    let drop_order = catalog.drop_order(scope);

    let mut teardown: Vec<BoxedTask<EngineCtx>> = Vec::new();
    let mut backups = backup_suffix.map(|suffix| {
        let mut storage: Vec<&PipelineObject> =
            drop_order.iter().copied().filter(|o| o.kind.is_storage()).collect();
        storage.reverse();
        each(storage, |o| Box::new(BackupStep::new(o, suffix)))
    });
    for object in &drop_order {
        if object.kind.is_storage()
            && let Some(steps) = backups.take()
        {
            teardown.extend(steps);
        }
        teardown.push(Box::new(EnsureAbsentStep::new(object)));
    }
    let sources = catalog.out_of_scope_sources(scope);

    // Consumers end detached whenever this run created them.
    let disarm = if scope.includes_adapters() {
        each(catalog.consumer_adapters(), |o| Box::new(DetachStep::new(o)))
    } else {
        Vec::new()
    };

    ExecutionPlan::new(vec![
        Stage::sequential(
            "pre-guard",
            each(guard_views.iter().copied(), |o| Box::new(DetachStep::new(o))),
        ),
        Stage::sequential("teardown", teardown),
        Stage::sequential(
            "reveal",
            each(sources.iter().copied(), |o| Box::new(RevealStep::new(o))),
        ),
        Stage::sequential(
            "rebuild",
            each(catalog.create_order(scope), |o| {
                Box::new(CreateStep::new(o, CreateMode::Strict))
            }),
        ),
        Stage::sequential(
            "conceal",
            each(sources.iter().copied(), |o| Box::new(DetachRevealedStep::new(o))),
        ),
        // Maintenance window: a view that won't come back is reported, not fatal.
        Stage::sequential(
            "post-guard",
            each(guard_views.iter().copied(), |o| {
                Box::new(AttachStep::new(o, OnFailure::Warn))
            }),
        ),
        Stage::sequential("disarm", disarm),
    ])
}

/// Full teardown, reverse creation order.
pub fn drop_plan(catalog: &ObjectCatalog) -> ExecutionPlan<EngineCtx> {
    ExecutionPlan::new(vec![Stage::sequential(
        "teardown",
        each(catalog.drop_order(ScopeFilter::All), |o| {
            Box::new(EnsureAbsentStep::new(o))
        }),
    )])
}

/// Start consumption.
pub fn enable_plan(catalog: &ObjectCatalog) -> ExecutionPlan<EngineCtx> {
    ExecutionPlan::new(vec![Stage::sequential(
        "arm",
        each(catalog.consumer_adapters(), |o| {
            Box::new(AttachStep::new(o, OnFailure::Abort))
        }),
    )])
}

/// Stop consumption.
pub fn disable_plan(catalog: &ObjectCatalog) -> ExecutionPlan<EngineCtx> {
    ExecutionPlan::new(vec![Stage::sequential(
        "disarm",
        each(catalog.consumer_adapters(), |o| Box::new(DetachStep::new(o))),
    )])
}
