//! # Effector fan-out: one effector, many entities, one task.
//!
//! ```text
//! invoke_many(caller, [t0, t1, t2], effector, params)
//!   ├─► targets empty            → None (no task at all)
//!   └─► ParallelTask:
//!         unit i: t_i.invoke(effector, params) ─► Task<T> ─► get().await
//!       submitted into caller.execution()        (attributed to the caller)
//!       └─► Some(Task<Vec<T>>)                   returned without waiting
//!
//! await: Ok([v0, v1, v2])  (input order)
//!    or  Err(Child { index, entity: "Kind[id=..]", source })  (first observed failure)
//! ```
//!
//! Each target's effector body still runs in the target's own execution context;
//! only the composite is scheduled in the caller's.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::entity::{Effector, Entity, Parameters};
use crate::events::{Event, EventKind};
use crate::tasks::{ParallelTask, Task};

/// [`invoke_many_with`] with an empty parameter set.
pub fn invoke_many<T, I>(
    caller: &Arc<Entity>,
    targets: I,
    effector: &Effector<T>,
) -> Option<Task<Vec<T>>>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Arc<Entity>>,
{
    invoke_many_with(caller, targets, effector, Parameters::new())
}

/// Fans `effector` out to every target and returns the composite task.
///
/// Returns `None` when `targets` is empty, which callers can tell apart from a
/// task that completes with an empty sequence.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use serde_json::json;
/// use entityvisor::{Effector, EffectorFn, Entity, ExecutionContext, invoke_many};
///
/// const PING: Effector<u64> = Effector::new("ping");
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = ExecutionContext::current();
/// let app = Entity::builder("App").build(&ctx);
/// let body = EffectorFn::arc(|e: Arc<Entity>, _| async move { Ok(json!(e.id().get())) });
/// let nodes: Vec<_> = (0..3)
///     .map(|_| Entity::builder("Node").effector(&PING, body.clone()).build_child_of(&app).unwrap())
///     .collect();
///
/// let task = invoke_many(&app, app.children(), &PING).unwrap();
/// let ids: Vec<u64> = nodes.iter().map(|n| n.id().get()).collect();
/// assert_eq!(task.get().await.unwrap(), ids);
///
/// assert!(invoke_many(&app, Vec::new(), &PING).is_none());
/// # }
/// ```
pub fn invoke_many_with<T, I>(
    caller: &Arc<Entity>,
    targets: I,
    effector: &Effector<T>,
    params: Parameters,
) -> Option<Task<Vec<T>>>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Arc<Entity>>,
{
    let effector = *effector;
    let name = effector.name();
    let mut composite = ParallelTask::new(format!("{caller}.{name}[*]"));

    for target in targets {
        let params = params.clone();
        composite.push(target.to_string(), async move {
            target.invoke(&effector, params)?.get().await
        });
    }
    if composite.is_empty() {
        return None;
    }

    let count = composite.len();
    let bus = caller.execution().bus().clone();
    let failures = bus.clone();
    let task_name = composite.name().to_string();
    let task = caller
        .execution()
        .submit_composite(task_name.clone(), async move {
            let res = composite.run().await;
            if let Err(e) = &res {
                let mut ev = Event::new(EventKind::InvocationFailed)
                    .with_effector(name)
                    .with_task(task_name)
                    .with_reason(e.root_cause().to_string());
                if let Some((_, entity)) = e.failed_child() {
                    ev = ev.with_entity(entity);
                }
                failures.publish(ev);
            }
            res
        });

    bus.publish(
        Event::new(EventKind::InvocationSubmitted)
            .with_entity(caller.to_string())
            .with_effector(name)
            .with_task(task.to_string())
            .with_count(count),
    );
    Some(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EffectorFn;
    use crate::error::TaskError;
    use crate::tasks::ExecutionContext;
    use serde_json::json;

    const ECHO: Effector<String> = Effector::new("echo");

    #[tokio::test]
    async fn test_parameters_reach_every_target() {
        let ctx = ExecutionContext::current();
        let caller = Entity::builder("Caller").build(&ctx);
        let body = EffectorFn::arc(|e: Arc<Entity>, params: Parameters| async move {
            let word: String = params.decode("word")?.unwrap_or_default();
            Ok(json!(format!("{}:{word}", e.kind())))
        });
        let targets = vec![
            Entity::builder("A").effector(&ECHO, body.clone()).build(&ctx),
            Entity::builder("B").effector(&ECHO, body).build(&ctx),
        ];

        let task = invoke_many_with(
            &caller,
            targets,
            &ECHO,
            Parameters::new().with("word", "hi"),
        )
        .unwrap();
        assert_eq!(task.get().await.unwrap(), vec!["A:hi", "B:hi"]);
    }

    #[tokio::test]
    async fn test_missing_effector_fails_composite() {
        let ctx = ExecutionContext::current();
        let caller = Entity::builder("Caller").build(&ctx);
        let plain = Entity::builder("Plain").build(&ctx);

        let err = invoke_many(&caller, vec![plain.clone()], &ECHO)
            .unwrap()
            .get()
            .await
            .unwrap_err();
        assert_eq!(err.failed_child(), Some((0, plain.to_string().as_str())));
        assert!(matches!(err.root_cause(), TaskError::EffectorNotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_targets_yield_no_task() {
        let ctx = ExecutionContext::current();
        let caller = Entity::builder("Caller").build(&ctx);
        let none: Option<Arc<Entity>> = None;

        assert!(invoke_many(&caller, none, &ECHO).is_none());
        assert!(invoke_many(&caller, Vec::new(), &ECHO).is_none());
    }

    #[tokio::test]
    async fn test_failure_is_published() {
        let ctx = ExecutionContext::current();
        let mut rx = ctx.bus().subscribe();
        let caller = Entity::builder("Caller").build(&ctx);
        let broken = Entity::builder("Broken")
            .effector(
                &ECHO,
                EffectorFn::arc(|_e, _p| async { Err(TaskError::fail("unreachable host")) }),
            )
            .build(&ctx);

        let task = invoke_many(&caller, vec![broken.clone()], &ECHO).unwrap();
        assert!(task.get().await.is_err());

        let submitted = rx.recv().await.unwrap();
        assert_eq!(submitted.kind, EventKind::InvocationSubmitted);
        assert_eq!(submitted.count, Some(1));

        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::InvocationFailed);
        assert_eq!(failed.entity.as_deref(), Some(broken.to_string().as_str()));
    }
}
