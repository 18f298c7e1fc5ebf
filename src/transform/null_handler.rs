//! Null-handling transformer
//!
//! Either drops every row containing a null, or fills nulls with a constant.

use crate::batch::{Column, RecordBatch, Value};
use crate::etl::Transformer;
use eyre::Result;
use serde::Deserialize;

fn default_drop_missing() -> bool {
    true
}

/// How missing values are handled before load
///
/// `drop_missing` takes precedence over `fill_value`. With neither active
/// the batch passes through unchanged.
///
/// ```yaml
/// transform:
///   drop_missing: false
///   fill_missing_value: 0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransformPolicy {
    /// Remove every row containing at least one null
    #[serde(default = "default_drop_missing")]
    pub drop_missing: bool,
    /// Replacement for null cells
    #[serde(default, rename = "fill_missing_value")]
    pub fill_value: Option<Value>,
}

impl Default for TransformPolicy {
    fn default() -> Self {
        Self {
            drop_missing: true,
            fill_value: None,
        }
    }
}

impl TransformPolicy {
    pub fn drop_missing() -> Self {
        Self::default()
    }

    pub fn fill(value: impl Into<Value>) -> Self {
        Self {
            drop_missing: false,
            fill_value: Some(value.into()),
        }
    }

    pub fn passthrough() -> Self {
        Self {
            drop_missing: false,
            fill_value: None,
        }
    }
}

/// Transformer applying a [`TransformPolicy`] to record batches
///
/// Filling follows a fixed coercion rule per column:
/// - same type as the fill value: filled as-is
/// - all-null column: takes the fill value's type
/// - Integer and Float mixed: the column becomes Float
/// - anything else: the column is widened to String and every cell is
///   rendered as text
///
/// Columns without nulls are never touched, so applying the transformer to
/// its own output changes nothing.
///
/// # Example
/// ```
/// use csv2snow::batch::{Column, RecordBatch, Value};
/// use csv2snow::etl::Transformer;
/// use csv2snow::transform::{NullHandler, TransformPolicy};
///
/// let batch = RecordBatch::try_new(vec![
///     Column::from_values("qty", vec![Value::Integer(1), Value::Null]),
/// ]).unwrap();
///
/// let filled = NullHandler::new(TransformPolicy::fill(0)).transform(batch).unwrap();
/// assert_eq!(filled.column("qty").unwrap().values(), &[Value::Integer(1), Value::Integer(0)]);
/// ```
#[derive(Debug, Clone)]
pub struct NullHandler {
    policy: TransformPolicy,
}

impl NullHandler {
    pub fn new(policy: TransformPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TransformPolicy {
        &self.policy
    }
}

fn fill_column(column: Column, fill: &Value) -> Column {
    if column.null_count() == 0 {
        return column;
    }

    let (name, data_type, values) = column.into_parts();
    let target = data_type.unify(fill.data_type());

    let values = values
        .into_iter()
        .map(|v| match v {
            Value::Null => fill.clone().cast(target),
            other => other.cast(target),
        })
        .collect();

    Column::new(name, target, values)
}

impl Transformer for NullHandler {
    type Input = RecordBatch;
    type Output = RecordBatch;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        log::info!(
            "Transforming data: drop_missing={}, fill_missing_value={}",
            self.policy.drop_missing,
            self.policy
                .fill_value
                .as_ref()
                .map_or("none".to_string(), |v| format!("{:?}", v))
        );

        if self.policy.drop_missing {
            let before = input.num_rows();
            let mask: Vec<bool> = (0..before).map(|i| !input.row_has_null(i)).collect();
            let output = input.filter_rows(|i| mask[i]);
            log::debug!("Dropped {} row(s) with missing values", before - output.num_rows());
            return Ok(output);
        }

        match &self.policy.fill_value {
            Some(fill) if !fill.is_null() => {
                log::debug!("Filling {} null cell(s)", input.null_count());
                Ok(input.map_columns(|c| fill_column(c, fill)))
            }
            _ => Ok(input),
        }
    }
}
