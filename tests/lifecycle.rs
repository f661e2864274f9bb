use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use entityvisor::{
    Config, Entity, Event, EventKind, LifecycleError, Location, LogWriter, ManagementContext,
    Startable, Subscribe, TaskError, destroy, start,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

impl Recorder {
    fn snapshot(&self) -> Vec<EventKind> {
        self.kinds.lock().clone()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, e: &Event) {
        self.kinds.lock().push(e.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

struct Service {
    fail_start: bool,
}

#[async_trait]
impl Startable for Service {
    async fn start(&self, _e: &Arc<Entity>, _l: &[Location]) -> Result<(), TaskError> {
        if self.fail_start {
            return Err(TaskError::fail("quota exceeded"));
        }
        Ok(())
    }

    async fn stop(&self, _e: &Arc<Entity>) -> Result<(), TaskError> {
        Ok(())
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn subscribers_observe_the_whole_lifecycle() {
    let recorder = Arc::new(Recorder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone(), Arc::new(LogWriter::new())];
    let ctx = ManagementContext::new(Config::default(), subs);
    let app = Entity::builder("App").build(ctx.execution_context());
    let web = Entity::builder("Web")
        .startable(Service { fail_start: false })
        .destroyable()
        .build_child_of(&app)
        .unwrap();

    let web = start(Some(&ctx), web, &[Location::new("eu-west")]).await.unwrap();
    destroy(Some(&ctx), &web).await.unwrap();
    settle().await;

    assert_eq!(
        recorder.snapshot(),
        vec![
            EventKind::EntityManaged,
            EventKind::EntityStarting,
            EventKind::EntityStarted,
            EventKind::EntityStopping,
            EventKind::EntityStopped,
            EventKind::EntityDestroyed,
            EventKind::EntityUnmanaged,
        ]
    );
    assert!(app.children().is_empty());
    assert!(ctx.managed().is_empty());
}

#[tokio::test]
async fn start_failure_is_returned_not_swallowed() {
    let ctx = ManagementContext::new(Config::default(), Vec::new());
    let e = Entity::builder("Web")
        .startable(Service { fail_start: true })
        .build(ctx.execution_context());

    let err = start(Some(&ctx), e.clone(), &[]).await.unwrap_err();
    match err {
        LifecycleError::Start { entity, source } => {
            assert_eq!(entity, e.to_string());
            assert_eq!(source, TaskError::fail("quota exceeded"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ctx.is_managed(&e));
}

#[tokio::test]
async fn destroy_without_context_only_touches_the_entity() {
    let ctx = ManagementContext::new(Config::default(), Vec::new());
    let parent = Entity::builder("App").build(ctx.execution_context());
    let e = Entity::builder("Cache")
        .destroyable()
        .build_child_of(&parent)
        .unwrap();
    ctx.manage(&e).unwrap();

    destroy(None, &e).await.unwrap();

    assert!(e.owner().is_none());
    assert!(ctx.is_managed(&e));
}
