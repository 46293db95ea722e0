use serde::Serialize;

use super::sequence::{take_string, Sequence};
use crate::decode::Columns;
use crate::error::ObservationsError;

/// A single frame. `sequence_id` links it to its [`Sequence`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub sequence_id: String,
    #[serde(flatten)]
    pub columns: Columns,
}

impl Image {
    pub fn from_columns(mut columns: Columns) -> Result<Self, ObservationsError> {
        let sequence_id = take_string(&mut columns, "sequence_id", "images")?;
        Ok(Self {
            sequence_id,
            columns,
        })
    }

    pub fn date_obs(&self) -> Option<&serde_json::Value> {
        self.columns.get("date_obs")
    }
}

/// One image of a sequence together with the sequence's own columns.
///
/// Serializes as a single flat object. Image columns that share a name with a
/// sequence column (at least `id`) are prefixed with `image_`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceImageJoinRow {
    #[serde(flatten)]
    pub sequence: Sequence,
    #[serde(flatten)]
    pub image: Image,
}

impl SequenceImageJoinRow {
    pub fn new(sequence: Sequence, image: Image) -> Self {
        let Image {
            sequence_id,
            columns,
        } = image;

        let columns = columns
            .into_iter()
            .map(|(name, value)| {
                if name == "id" || sequence.columns.contains_key(&name) {
                    (format!("image_{}", name), value)
                } else {
                    (name, value)
                }
            })
            .collect();

        Self {
            sequence,
            image: Image {
                sequence_id,
                columns,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(value: serde_json::Value) -> Columns {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_join_row_flattens_and_prefixes_collisions() {
        let sequence = Sequence::from_columns(columns(json!({
            "id": "PAN001_14d3bd_20180216T052811",
            "start_date": "2018-02-16T05:28:11",
            "exptime": 120.0,
        })))
        .unwrap();
        let image = Image::from_columns(columns(json!({
            "id": "PAN001_14d3bd_20180216T053012",
            "sequence_id": "PAN001_14d3bd_20180216T052811",
            "date_obs": "2018-02-16T05:30:12",
            "exptime": 119.9,
        })))
        .unwrap();

        let row = SequenceImageJoinRow::new(sequence, image);
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["id"], "PAN001_14d3bd_20180216T052811");
        assert_eq!(value["image_id"], "PAN001_14d3bd_20180216T053012");
        assert_eq!(value["sequence_id"], "PAN001_14d3bd_20180216T052811");
        assert_eq!(value["start_date"], "2018-02-16T05:28:11");
        assert_eq!(value["date_obs"], "2018-02-16T05:30:12");
        assert_eq!(value["exptime"], 120.0);
        assert_eq!(value["image_exptime"], 119.9);
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_image_requires_text_sequence_id() {
        let missing = Image::from_columns(columns(json!({ "id": "img" })));
        assert!(matches!(missing, Err(ObservationsError::RowShape(_))));

        let numeric = Image::from_columns(columns(json!({ "sequence_id": 7 })));
        assert!(matches!(numeric, Err(ObservationsError::RowShape(_))));
    }

    #[test]
    fn test_date_obs_accessor() {
        let image = Image::from_columns(columns(json!({
            "sequence_id": "seq",
            "date_obs": "2018-02-16T05:30:12",
        })))
        .unwrap();
        assert_eq!(image.date_obs(), Some(&json!("2018-02-16T05:30:12")));
    }
}
