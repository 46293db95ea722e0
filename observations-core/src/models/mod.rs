pub mod image;
pub mod sequence;

pub use image::{Image, SequenceImageJoinRow};
pub use sequence::{Sequence, SequenceWithImageCount};

use serde::Serialize;

/// Result of one observations query. Serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Observations {
    /// Unfiltered listing, newest `start_date` first.
    Sequences(Vec<SequenceWithImageCount>),
    /// Images of one sequence, newest `date_obs` first.
    Images(Vec<SequenceImageJoinRow>),
}

impl Observations {
    pub fn len(&self) -> usize {
        match self {
            Observations::Sequences(rows) => rows.len(),
            Observations::Images(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response body: `{"data": [...], "count": n}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationsEnvelope {
    pub data: Observations,
    pub count: usize,
}

impl From<Observations> for ObservationsEnvelope {
    fn from(data: Observations) -> Self {
        let count = data.len();
        Self { data, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sequence(id: &str, start_date: &str) -> Sequence {
        let columns = json!({ "id": id, "start_date": start_date })
            .as_object()
            .cloned()
            .unwrap();
        Sequence::from_columns(columns).unwrap()
    }

    #[test]
    fn test_envelope_counts_rows() {
        let data = Observations::Sequences(vec![
            SequenceWithImageCount {
                sequence: sequence("A", "2018-02-17T00:00:00"),
                image_count: 5,
            },
            SequenceWithImageCount {
                sequence: sequence("B", "2018-02-16T00:00:00"),
                image_count: 2,
            },
        ]);

        let body = serde_json::to_value(ObservationsEnvelope::from(data)).unwrap();
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["id"], "A");
        assert_eq!(body["data"][0]["image_count"], 5);
        assert_eq!(body["data"][1]["id"], "B");
        assert_eq!(body["data"][1]["image_count"], 2);
    }

    #[test]
    fn test_empty_images_serialize_as_empty_array() {
        let body = serde_json::to_value(ObservationsEnvelope::from(Observations::Images(vec![])))
            .unwrap();
        assert_eq!(body, json!({ "data": [], "count": 0 }));
    }
}
