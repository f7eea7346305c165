//! Keys that are never accepted anywhere in a request body.

use serde_json::{Map, Value};

/// Keys rejected at any depth: prototype pollution and query-operator
/// injection.
pub const DENYLIST: &[&str] = &[
    "__proto__",
    "constructor",
    "prototype",
    "$where",
    "$ne",
    "$eq",
    "$gt",
    "$gte",
    "$lt",
    "$lte",
    "$in",
    "$nin",
    "$or",
    "$and",
    "$not",
    "$nor",
    "$regex",
    "$expr",
    "$exists",
    "$function",
    "$accumulator",
];

/// Reserved leading sigil for operator keys.
pub const RESERVED_SIGIL: char = '$';

/// Characters that address into nested documents.
pub const PATH_SEPARATORS: &[char] = &['.', '/'];

/// Returns true if `key` must be rejected.
#[must_use]
pub fn is_dangerous(key: &str) -> bool {
    DENYLIST.contains(&key) || key.starts_with(RESERVED_SIGIL) || key.contains(PATH_SEPARATORS)
}

/// Walks `value` and returns the path of the first dangerous key found.
///
/// Paths use `.` between object keys and `[i]` for array elements.
#[must_use]
pub fn find_dangerous_key(value: &Value) -> Option<String> {
    walk(value, "")
}

/// Like [`find_dangerous_key`], for an already-parsed object.
#[must_use]
pub fn find_dangerous_key_in(map: &Map<String, Value>) -> Option<String> {
    walk_map(map, "")
}

fn walk_map(map: &Map<String, Value>, path: &str) -> Option<String> {
    map.iter().find_map(|(key, child)| {
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        if is_dangerous(key) {
            Some(child_path)
        } else {
            walk(child, &child_path)
        }
    })
}

fn walk(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Object(map) => walk_map(map, path),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| walk(item, &format!("{path}[{i}]"))),
        _ => None,
    }
}
