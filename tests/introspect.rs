use std::io::{self, Write};

use entityvisor::introspect::{DumpOptions, dump_info, dump_info_to_string, dump_info_with};
use entityvisor::{
    AttributeSensor, ConfigKey, DumpError, Entity, ExecutionContext, Location, NotificationSensor,
    Task, TaskError,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const REGION: ConfigKey<String> = ConfigKey::new("cloud.region");
const API_PRIVATE_KEY: ConfigKey<String> = ConfigKey::new("api.private.key");
const EMPTY_SECRET: ConfigKey<String> = ConfigKey::new("secret.empty");
const BLANK: ConfigKey<String> = ConfigKey::new("blank");
const REPLICAS: ConfigKey<u32> = ConfigKey::new("replicas");
const DEFERRED: ConfigKey<String> = ConfigKey::new("deferred.url");
const UP: AttributeSensor<bool> = AttributeSensor::new("service.up");
const TOKEN: AttributeSensor<String> = AttributeSensor::new("session.credential");
const RESTARTED: NotificationSensor = NotificationSensor::new("restarted");

#[tokio::test]
async fn full_subtree_dump() {
    let ctx = ExecutionContext::current();
    let app = Entity::builder("App")
        .named("shop")
        .location(Location::new("eu-west"))
        .location(Location::new("us-east"))
        .config(&REGION, "eu")
        .config(&API_PRIVATE_KEY, "-----BEGIN")
        .config(&EMPTY_SECRET, "")
        .config(&BLANK, "")
        .config(&REPLICAS, 0)
        .declare(&DEFERRED)
        .attribute(&UP, false)
        .attribute(&TOKEN, "abc")
        .notification(&RESTARTED)
        .build(&ctx);
    let db = Entity::builder("Db").build_child_of(&app).unwrap();
    let replica = Entity::builder("Replica")
        .attribute(&UP, true)
        .build_child_of(&db)
        .unwrap();
    let web = Entity::builder("Web").build_child_of(&app).unwrap();

    let text = dump_info_to_string(&app).await.unwrap();
    let expected = [
        format!("{app}"),
        "    locations = [eu-west, us-east]".to_string(),
        "    api.private.key = xxxxxxxx".to_string(),
        "    cloud.region = eu".to_string(),
        "    replicas = 0".to_string(),
        "    secret.empty = xxxxxxxx".to_string(),
        "    service.up: false".to_string(),
        "    session.credential: xxxxxxxx".to_string(),
        format!("  {db}"),
        "      locations = []".to_string(),
        format!("    {replica}"),
        "        locations = []".to_string(),
        "        service.up: true".to_string(),
        format!("  {web}"),
        "      locations = []".to_string(),
    ]
    .join("\n")
        + "\n";
    assert_eq!(text, expected);
}

#[tokio::test]
async fn pending_deferred_value_prints_the_task() {
    let ctx = ExecutionContext::current();
    let (task, _completer) = Task::<Value>::channel("lookup");
    let e = Entity::builder("Web")
        .deferred_config(&DEFERRED, task.clone())
        .build(&ctx);

    let text = dump_info_to_string(&e).await.unwrap();
    assert!(text.contains(&format!("deferred.url = {task}\n")));
}

#[tokio::test]
async fn interrupted_retrieval_stops_the_dump_quietly() {
    let ctx = ExecutionContext::current();
    let ready = Task::ready("resolved", json!("http://x"));
    let parent = Entity::builder("Parent")
        .deferred_config(&DEFERRED, ready)
        .build(&ctx);
    let _child = Entity::builder("Child").build_child_of(&parent).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let opts = DumpOptions {
        interrupt: Some(token.clone()),
        ..DumpOptions::default()
    };
    let mut buf = Vec::new();
    dump_info_with(&parent, &mut buf, &opts).await.unwrap();

    let text = String::from_utf8(buf).unwrap();
    assert!(token.is_cancelled());
    assert!(!text.contains("deferred.url"));
    assert!(!text.contains("Child"));
}

#[tokio::test]
async fn failed_deferred_value_is_marked() {
    let ctx = ExecutionContext::current();
    let failed = Task::<Value>::failed("lookup", TaskError::fail("dns"));
    let e = Entity::builder("Web")
        .deferred_config(&DEFERRED, failed.clone())
        .build(&ctx);

    let text = dump_info_to_string(&e).await.unwrap();
    assert!(text.contains(&format!("deferred.url = ERROR in {failed}\n")));
}

/// Sink that refuses every write.
struct Unavailable;

impl Write for Unavailable {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn sink_failures_are_wrapped() {
    let ctx = ExecutionContext::current();
    let e = Entity::builder("Web").build(&ctx);

    let err = dump_info(&e, &mut Unavailable).await.unwrap_err();
    assert!(matches!(err, DumpError::Io(_)));
    assert_eq!(err.as_label(), "dump_io");
}
