//! Item command implementations: reads, writes and removal.

use super::render;
use crate::error::CliResult;
use forage_codec::{from_json, Value};
use forage_core::{DropTarget, LocalForage};
use parking_lot::Mutex;
use std::sync::Arc;

/// Prints the value stored under `key`, or `null` when absent.
pub async fn get(forage: &LocalForage, key: &str) -> CliResult<()> {
    match forage.get_item(key).await? {
        Some(value) => println!("{}", render(&value)?),
        None => println!("null"),
    }
    Ok(())
}

/// Parses `json` and stores it under `key`.
pub async fn set(forage: &LocalForage, key: &str, json: &str) -> CliResult<()> {
    let value = parse_value(json)?;
    forage.set_item(key, value).await?;
    tracing::info!(key, driver = ?forage.driver(), "stored value");
    Ok(())
}

/// Removes `key`.
pub async fn remove(forage: &LocalForage, key: &str) -> CliResult<()> {
    forage.remove_item(key).await?;
    tracing::info!(key, "removed value");
    Ok(())
}

/// Prints every key, one per line.
pub async fn keys(forage: &LocalForage) -> CliResult<()> {
    for key in forage.keys().await? {
        println!("{key}");
    }
    Ok(())
}

/// Prints the number of stored values.
pub async fn length(forage: &LocalForage) -> CliResult<()> {
    println!("{}", forage.length().await?);
    Ok(())
}

/// Removes every value in the store.
pub async fn clear(forage: &LocalForage) -> CliResult<()> {
    forage.clear().await?;
    tracing::info!(store = %forage.config().store_name, "cleared store");
    Ok(())
}

/// Prints up to `limit` entries as JSON lines.
pub async fn dump(forage: &LocalForage, limit: Option<u32>) -> CliResult<()> {
    for line in dump_lines(forage, limit).await? {
        println!("{line}");
    }
    Ok(())
}

/// Deletes the store, or every store of the database when `database` is set.
pub async fn drop(forage: &LocalForage, database: bool) -> CliResult<()> {
    let config = forage.config();
    let target = if database {
        DropTarget::database(config.name.clone())
    } else {
        DropTarget::store(config.name.clone(), config.store_name.clone())
    };
    forage.drop_instance(Some(target)).await?;
    tracing::info!(name = %config.name, database, "dropped data");
    Ok(())
}

/// Parses a command-line JSON argument into a storable value.
pub fn parse_value(json: &str) -> CliResult<Value> {
    let parsed: serde_json::Value = serde_json::from_str(json)?;
    Ok(from_json(parsed))
}

/// Collects entries as `{"key": .., "value": ..}` lines in iteration order.
pub async fn dump_lines(forage: &LocalForage, limit: Option<u32>) -> CliResult<Vec<String>> {
    let entries: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
    let sink = Arc::clone(&entries);
    forage
        .iterate(move |value, key, n| {
            sink.lock().push((key.to_string(), value.clone()));
            match limit {
                Some(limit) if n >= limit => Some(Value::Null),
                _ => None,
            }
        })
        .await?;

    let entries = std::mem::take(&mut *entries.lock());
    entries
        .into_iter()
        .map(|(key, value)| {
            Ok(format!(
                "{{\"key\":{},\"value\":{}}}",
                serde_json::to_string(&key)?,
                render(&value)?
            ))
        })
        .collect()
}
