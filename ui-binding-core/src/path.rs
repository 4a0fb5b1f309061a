//! Dot-delimited path helpers for walking a [`Value`] tree
//!
//! A path such as `"position.x"` addresses `root["position"]["x"]`. Numeric
//! segments index into arrays, so `"tags.0"` is the first tag.

use crate::value::Value;

/// Split a path into its segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// The parent part of a path (`"a.b.c"` -> `Some("a.b")`)
///
/// Returns `None` for single-segment paths and for paths starting with a dot.
pub fn parent(path: &str) -> Option<&str> {
    match path.rfind('.') {
        Some(idx) if idx > 0 => Some(&path[..idx]),
        _ => None,
    }
}

/// Resolve a path to a reference inside `root`
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments(path) {
        node = child(node, segment)?;
    }
    Some(node)
}

/// Resolve a path to a mutable reference inside `root`
pub fn lookup_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in segments(path) {
        node = child_mut(node, segment)?;
    }
    Some(node)
}

/// Write `value` at `path`, creating missing intermediate objects.
///
/// Returns the previous value, or `Err(())` when an intermediate node exists
/// but cannot hold children (a string, number, ...).
#[allow(clippy::result_unit_err)]
pub fn assign(root: &mut Value, path: &str, value: Value) -> Result<Option<Value>, ()> {
    let mut parts: Vec<&str> = segments(path).collect();
    let Some(last) = parts.pop() else {
        return Err(());
    };

    let mut node = root;
    for segment in parts {
        if child(node, segment).is_none() {
            match &mut *node {
                Value::Object(map) => {
                    map.insert(segment.to_string(), Value::object());
                }
                _ => return Err(()),
            }
        }
        node = child_mut(node, segment).ok_or(())?;
    }

    match node {
        Value::Object(map) => Ok(map.insert(last.to_string(), value)),
        Value::Array(items) => {
            let idx: usize = last.parse().map_err(|_| ())?;
            let len = items.len();
            match items.get_mut(idx) {
                Some(slot) => Ok(Some(std::mem::replace(slot, value))),
                None if idx == len => {
                    items.push(value);
                    Ok(None)
                }
                None => Err(()),
            }
        }
        _ => Err(()),
    }
}

/// Remove the value at `path`, returning it if present
pub fn remove(root: &mut Value, path: &str) -> Option<Value> {
    let (node, last) = match parent(path) {
        Some(parent_path) => (lookup_mut(root, parent_path)?, &path[parent_path.len() + 1..]),
        None => (root, path),
    };

    match node {
        Value::Object(map) => map.remove(last),
        Value::Array(items) => {
            let idx: usize = last.parse().ok()?;
            (idx < items.len()).then(|| items.remove(idx))
        }
        _ => None,
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}
