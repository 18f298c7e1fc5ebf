//! Column type inference for raw CSV fields

use crate::batch::{Column, DataType, Value};

/// Field contents read as a missing value
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_null_marker(field: &str) -> bool {
    NULL_MARKERS.contains(&field)
}

fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Infer a typed column from raw fields
///
/// Null markers become [`Value::Null`]. The remaining fields pick the
/// narrowest type that fits all of them: Boolean, then Integer, then Float,
/// falling back to String. A column of only nulls is typed [`DataType::Null`].
pub fn infer_column(name: &str, fields: &[Option<&str>]) -> Column {
    let present = || {
        fields
            .iter()
            .filter_map(|f| f.filter(|s| !is_null_marker(s)))
    };

    let data_type = if present().next().is_none() {
        DataType::Null
    } else if present().all(|s| parse_bool(s).is_some()) {
        DataType::Boolean
    } else if present().all(|s| s.trim().parse::<i64>().is_ok()) {
        DataType::Integer
    } else if present().all(|s| s.trim().parse::<f64>().is_ok()) {
        DataType::Float
    } else {
        DataType::String
    };

    let values = fields
        .iter()
        .map(|field| match field {
            None => Value::Null,
            Some(s) if is_null_marker(s) => Value::Null,
            Some(s) => convert(s, data_type),
        })
        .collect();

    Column::new(name, data_type, values)
}

fn convert(field: &str, data_type: DataType) -> Value {
    // Every field was checked against `data_type` during inference
    match data_type {
        DataType::Boolean => parse_bool(field).map_or(Value::Null, Value::Boolean),
        DataType::Integer => field.trim().parse().map_or(Value::Null, Value::Integer),
        DataType::Float => field.trim().parse().map_or(Value::Null, Value::Float),
        DataType::String | DataType::Null => Value::String(field.to_string()),
    }
}

/// Make header names unique and non-empty
///
/// Blank names become `Unnamed: {index}`. Repeats of a name get `.1`, `.2`,
/// ... appended, skipping suffixes already taken by another header.
pub fn dedupe_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let raw: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut names = Vec::with_capacity(raw.len());
    for name in &raw {
        let mut candidate = name.clone();
        let mut n = 1;
        while taken.contains(&candidate) || (candidate != *name && raw.contains(&candidate)) {
            candidate = format!("{}.{}", name, n);
            n += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}
