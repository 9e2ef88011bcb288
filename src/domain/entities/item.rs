//! Accessors for opaque server records.
//!
//! Listed entities are kept as [`serde_json::Value`]; call sites read the few fields they
//! match on through these helpers instead of deserializing full models.

use serde_json::Value;

pub type Item = Value;

/// String at a JSON pointer (`/fromRef/displayId`).
pub fn str_at<'a>(item: &'a Item, pointer: &str) -> Option<&'a str> {
    item.pointer(pointer).and_then(Value::as_str)
}

/// Integer at a JSON pointer.
pub fn i64_at(item: &Item, pointer: &str) -> Option<i64> {
    item.pointer(pointer).and_then(Value::as_i64)
}

/// Bool at a JSON pointer.
pub fn bool_at(item: &Item, pointer: &str) -> Option<bool> {
    item.pointer(pointer).and_then(Value::as_bool)
}

/// Numeric or string id of a record, rendered for use in a URL path.
pub fn id_of(item: &Item) -> Option<String> {
    match item.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Strings found at `pointer` inside each element of the array at `array_pointer`.
pub fn strings_in<'a>(item: &'a Item, array_pointer: &str, pointer: &str) -> Vec<&'a str> {
    item.pointer(array_pointer)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| {
                    if pointer.is_empty() {
                        v.as_str()
                    } else {
                        v.pointer(pointer).and_then(Value::as_str)
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Case-insensitive, order-insensitive comparison of two name lists.
pub fn same_names<A, B>(left: &[A], right: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let mut l: Vec<String> = left.iter().map(|s| s.as_ref().to_lowercase()).collect();
    let mut r: Vec<String> = right.iter().map(|s| s.as_ref().to_lowercase()).collect();
    l.sort();
    l.dedup();
    r.sort();
    r.dedup();
    l == r
}
