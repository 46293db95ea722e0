//! The two read queries and the mapping from their rows to typed records.

use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, PgConnection, Row};

use crate::decode::columns_to_map;
use crate::error::ObservationsError;
use crate::models::{Image, Sequence, SequenceImageJoinRow, SequenceWithImageCount};

/// Every image of one sequence, newest first.
pub const SEQUENCE_IMAGES_SQL: &str = r#"
    SELECT t1.*, t2.*
    FROM sequences t1
    JOIN images t2 ON t1.id = t2.sequence_id
    WHERE t1.id = $1
    ORDER BY t2.date_obs DESC
"#;

/// One row per sequence with its image count, newest first.
/// The inner join leaves out sequences that have no images yet.
pub const SEQUENCES_WITH_COUNTS_SQL: &str = r#"
    SELECT t1.*, count(t2.id) AS image_count
    FROM sequences t1
    JOIN images t2 ON t1.id = t2.sequence_id
    GROUP BY t1.id
    ORDER BY t1.start_date DESC
"#;

const IMAGE_COUNT: &str = "image_count";

pub async fn fetch_sequence_images(
    conn: &mut PgConnection,
    sequence_id: &str,
) -> Result<Vec<SequenceImageJoinRow>, ObservationsError> {
    let rows = sqlx::query(SEQUENCE_IMAGES_SQL)
        .bind(sequence_id)
        .fetch_all(conn)
        .await?;

    rows.iter().map(join_row).collect()
}

pub async fn fetch_sequences_with_counts(
    conn: &mut PgConnection,
) -> Result<Vec<SequenceWithImageCount>, ObservationsError> {
    // No placeholder in this statement, so nothing is bound.
    let rows = sqlx::query(SEQUENCES_WITH_COUNTS_SQL)
        .fetch_all(conn)
        .await?;

    rows.iter().map(count_row).collect()
}

/// Columns that came from the same table as the first column (`t1`, the
/// sequence) versus everything else.
fn split_by_relation(row: &PgRow) -> (Vec<&PgColumn>, Vec<&PgColumn>) {
    let columns = row.columns();
    let sequence_relation = columns.first().and_then(|c| c.relation_id());

    columns
        .iter()
        .partition(|c| sequence_relation.is_some() && c.relation_id() == sequence_relation)
}

fn join_row(row: &PgRow) -> Result<SequenceImageJoinRow, ObservationsError> {
    let (sequence_columns, image_columns) = split_by_relation(row);
    let sequence = Sequence::from_columns(columns_to_map(row, sequence_columns)?)?;
    let image = Image::from_columns(columns_to_map(row, image_columns)?)?;
    Ok(SequenceImageJoinRow::new(sequence, image))
}

fn count_row(row: &PgRow) -> Result<SequenceWithImageCount, ObservationsError> {
    let (sequence_columns, _) = split_by_relation(row);
    let sequence_columns = sequence_columns
        .into_iter()
        .filter(|c| c.name() != IMAGE_COUNT);

    let sequence = Sequence::from_columns(columns_to_map(row, sequence_columns)?)?;
    let image_count: i64 = row.try_get(IMAGE_COUNT)?;

    Ok(SequenceWithImageCount {
        sequence,
        image_count,
    })
}
