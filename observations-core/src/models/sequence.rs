use serde::Serialize;

use crate::decode::Columns;
use crate::error::ObservationsError;

/// An observation session. Only `id` is interpreted; every other column of
/// the `sequences` table rides along in `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub id: String,
    #[serde(flatten)]
    pub columns: Columns,
}

impl Sequence {
    pub fn from_columns(mut columns: Columns) -> Result<Self, ObservationsError> {
        let id = take_string(&mut columns, "id", "sequences")?;
        Ok(Self { id, columns })
    }
}

/// Row of the unfiltered listing: one per sequence that has images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceWithImageCount {
    #[serde(flatten)]
    pub sequence: Sequence,
    pub image_count: i64,
}

/// Remove a required text column from a decoded row.
pub(crate) fn take_string(
    columns: &mut Columns,
    name: &str,
    table: &str,
) -> Result<String, ObservationsError> {
    match columns.remove(name) {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Err(ObservationsError::RowShape(format!(
            "{}.{} must be text, got {}",
            table, name, other
        ))),
        None => Err(ObservationsError::RowShape(format!(
            "{}.{} missing from row",
            table, name
        ))),
    }
}
