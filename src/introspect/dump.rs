//! # Recursive, redacted dump of an entity subtree.
//!
//! ## Format
//! ```text
//! {indent}App[id=1,name=shop]
//! {indent}{tab}{tab}locations = [eu-west]
//! {indent}{tab}{tab}db.password = xxxxxxxx
//! {indent}{tab}{tab}http.port = 8080
//! {indent}{tab}{tab}web.url = http://a:8080 (from Task[resolve-url#7])
//! {indent}{tab}{tab}service.up: true
//! {indent}{tab}Web[id=2]                     ← children at indent + tab
//! ...
//! ```
//!
//! ## Rules
//! - Config keys (`key = value`) and attribute sensors (`name: value`) are sorted by name.
//! - Trivial values are skipped; secret names always print as [`REDACTED`].
//! - Deferred config values: done ok → `value (from Task[..])`, done failed → `ERROR in Task[..]`,
//!   not done → the task itself.
//! - Strings print raw, everything else as compact JSON.
//! - When [`DumpOptions::interrupt`] fires while a deferred value is retrieved, the dump
//!   stops where it is and returns `Ok(())`.

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::entity::{ConfigValue, Entity, SensorKind};
use crate::error::{DumpError, TaskError};
use crate::introspect::{REDACTED, is_secret, is_trivial};
use crate::tasks::Task;

/// Indentation and interruption settings of a dump.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Prefix of the first line.
    pub indentation: String,
    /// One nesting level.
    pub tab: String,
    /// Abandons the dump when cancelled during a deferred-value retrieval.
    pub interrupt: Option<CancellationToken>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            indentation: String::new(),
            tab: "  ".to_string(),
            interrupt: None,
        }
    }
}

enum Flow {
    Continue,
    Interrupted,
}

/// Dumps `entity` and its subtree to `out` with default options.
pub async fn dump_info<W: Write>(entity: &Entity, out: &mut W) -> Result<(), DumpError> {
    dump_info_with(entity, out, &DumpOptions::default()).await
}

/// Dumps `entity` and its subtree to `out`; `out` is flushed once the subtree is rendered.
pub async fn dump_info_with<W: Write>(
    entity: &Entity,
    out: &mut W,
    opts: &DumpOptions,
) -> Result<(), DumpError> {
    if let Flow::Interrupted = render(entity, &opts.indentation, opts, out).await? {
        return Ok(());
    }

    // Pre-order walk, explicit stack: (entity, depth below the root).
    let mut stack: Vec<(Arc<Entity>, usize)> =
        entity.children().into_iter().rev().map(|c| (c, 1)).collect();
    while let Some((current, depth)) = stack.pop() {
        let indentation = format!("{}{}", opts.indentation, opts.tab.repeat(depth));
        if let Flow::Interrupted = render(&current, &indentation, opts, out).await? {
            return Ok(());
        }
        stack.extend(current.children().into_iter().rev().map(|c| (c, depth + 1)));
    }

    out.flush()?;
    Ok(())
}

/// Renders the dump into a `String`.
pub async fn dump_info_to_string(entity: &Entity) -> Result<String, DumpError> {
    let mut buf = Vec::new();
    dump_info(entity, &mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Dumps to standard output.
pub async fn dump_info_stdout(entity: &Entity) -> Result<(), DumpError> {
    let mut buf = Vec::new();
    dump_info(entity, &mut buf).await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&buf)?;
    stdout.flush()?;
    Ok(())
}

async fn render<W: Write>(
    entity: &Entity,
    indentation: &str,
    opts: &DumpOptions,
    out: &mut W,
) -> Result<Flow, DumpError> {
    let field = format!("{indentation}{tab}{tab}", tab = opts.tab);

    writeln!(out, "{indentation}{entity}")?;
    let locations: Vec<String> = entity.locations().iter().map(ToString::to_string).collect();
    writeln!(out, "{field}locations = [{}]", locations.join(", "))?;

    let mut keys = entity.config_keys();
    keys.sort_by(|a, b| a.name.cmp(&b.name));
    for key in keys {
        let Some(value) = entity.config_value(&key.name) else {
            continue;
        };
        let trivial = matches!(&value, ConfigValue::Ready(v) if is_trivial(v));
        if trivial && !is_secret(&key.name) {
            continue;
        }

        let rendered = if is_secret(&key.name) {
            REDACTED.to_string()
        } else {
            match value {
                ConfigValue::Ready(v) => display_value(&v),
                ConfigValue::Deferred(task) => match deferred(&task, opts).await? {
                    Some(text) => text,
                    None => return Ok(Flow::Interrupted),
                },
            }
        };
        writeln!(out, "{field}{} = {rendered}", key.name)?;
    }

    let mut sensors = entity.sensors();
    sensors.retain(|s| s.kind == SensorKind::Attribute);
    sensors.sort_by(|a, b| a.name.cmp(&b.name));
    for sensor in sensors {
        let Some(value) = entity.attribute_value(&sensor.name) else {
            continue;
        };
        if is_trivial(&value) && !is_secret(&sensor.name) {
            continue;
        }
        let rendered = if is_secret(&sensor.name) {
            REDACTED.to_string()
        } else {
            display_value(&value)
        };
        writeln!(out, "{field}{}: {rendered}", sensor.name)?;
    }

    Ok(Flow::Continue)
}

/// Text for a deferred value; `None` when the retrieval was interrupted.
async fn deferred(task: &Task<Value>, opts: &DumpOptions) -> Result<Option<String>, DumpError> {
    if !task.is_done() {
        return Ok(Some(task.to_string()));
    }
    if task.is_error() {
        return Ok(Some(format!("ERROR in {task}")));
    }

    let res = match &opts.interrupt {
        Some(token) => task.get_or_cancel(token).await,
        None => task.get().await,
    };
    match res {
        Ok(v) => Ok(Some(format!("{} (from {task})", display_value(&v)))),
        Err(TaskError::Canceled) => Ok(None),
        Err(source) => Err(DumpError::InconsistentTask {
            task: task.to_string(),
            source,
        }),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
