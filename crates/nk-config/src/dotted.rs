//! Dotted-key navigation over JSON object trees (`"chains.local.chain"`).

use anyhow::{Result, bail};
use serde_json::{Map, Value};

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('.')
}

pub(crate) fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(key) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set `key` to `value`, creating intermediate mappings as needed.
pub(crate) fn insert(root: &mut Value, key: &str, value: Value) -> Result<()> {
    if key.is_empty() || segments(key).any(str::is_empty) {
        bail!("invalid config key {key:?}");
    }
    let mut parts: Vec<&str> = segments(key).collect();
    let Some(leaf) = parts.pop() else {
        bail!("invalid config key {key:?}");
    };

    let mut current = root;
    for segment in parts {
        let Some(map) = current.as_object_mut() else {
            bail!("cannot set {key:?}: parent of '{segment}' is not a mapping");
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let Some(map) = current.as_object_mut() else {
        bail!("cannot set {key:?}: parent of '{leaf}' is not a mapping");
    };
    map.insert(leaf.to_string(), value);
    Ok(())
}

pub(crate) fn remove(root: &mut Value, key: &str) -> Option<Value> {
    let (parent, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (lookup_mut(root, parent)?, leaf),
        None => (root, key),
    };
    parent.as_object_mut()?.remove(leaf)
}

fn lookup_mut<'a>(root: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments(key) {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}
