//! Result normalizer: reduces arbitrarily nested stage output into a
//! flat, displayable tabular form.
//!
//! Total over the whole JSON value space — any shape degrades to a
//! string rendering rather than failing, so the display layer never has
//! to handle an error from here.

use serde::Serialize;
use serde_json::Value;

/// Composite field-name separator for nested objects.
const PATH_SEPARATOR: &str = " / ";

/// A read-only tabular view of one stage result, regenerated from the
/// source value on demand and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlattenedTable {
    /// Ordered (field, value) pairs from an object or a scalar.
    Fields { fields: Vec<(String, String)> },
    /// One row per element of an array of objects, with the union
    /// column set in first-seen order.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Single-column table from an array of scalars.
    Values { values: Vec<String> },
}

/// Flatten any JSON-compatible value into a table.
pub fn flatten(value: &Value) -> FlattenedTable {
    match value {
        Value::Object(map) => {
            let mut fields = Vec::new();
            flatten_object_into(map, None, &mut fields);
            FlattenedTable::Fields { fields }
        }
        Value::Array(items) if items.iter().any(Value::is_object) => flatten_rows(items),
        Value::Array(items) => FlattenedTable::Values {
            values: items.iter().map(render_cell).collect(),
        },
        scalar => FlattenedTable::Fields {
            fields: vec![("Value".to_string(), render_cell(scalar))],
        },
    }
}

/// Recurse through an object, expanding nested objects into composite
/// field names and preserving insertion order throughout.
fn flatten_object_into(
    map: &serde_json::Map<String, Value>,
    prefix: Option<&str>,
    out: &mut Vec<(String, String)>,
) {
    for (key, value) in map {
        let field = match prefix {
            Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten_object_into(inner, Some(&field), out),
            other => out.push((field, render_cell(other))),
        }
    }
}

/// Array of objects: union columns in first-seen order, one row per
/// element. Non-object elements land in a trailing "Value" column.
fn flatten_rows(items: &[Value]) -> FlattenedTable {
    let mut columns: Vec<String> = Vec::new();
    for item in items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let has_scalar_items = items.iter().any(|i| !i.is_object());
    if has_scalar_items && !columns.iter().any(|c| c == "Value") {
        columns.push("Value".to_string());
    }

    let rows = items
        .iter()
        .map(|item| match item {
            Value::Object(map) => columns
                .iter()
                .map(|column| map.get(column).map(render_cell).unwrap_or_default())
                .collect(),
            other => {
                let mut row = vec![String::new(); columns.len()];
                if let Some(last) = row.last_mut() {
                    *last = render_cell(other);
                }
                row
            }
        })
        .collect();

    FlattenedTable::Rows { columns, rows }
}

/// Render one value as cell text. Scalars render plainly; arrays of
/// scalars join with commas; anything else degrades to compact JSON.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(render_cell)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !value.is_object() && !value.is_array()
}
