//! Event instance resolution
//!
//! An instance is identified by `(event_name, event_datetime_start)` at
//! literal-timestamp granularity: two rows whose start times render to the
//! same canonical string collide into one instance. Lookup and insert use
//! the same canonical literal so repeated runs always hit the same row.

use crate::normalize::{parse_int_or_null, to_null_if_blank, to_timestamp_literal};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// Ensure there is a single event instance for this row's
/// `(event_name, start)` pair, returning its id. `None` when either half
/// of the natural key is missing.
pub async fn resolve_event_instance(
    conn: &mut SqliteConnection,
    row: &StagedRow,
) -> Result<Option<i64>> {
    let Some(event_name) = to_null_if_blank(row.event_name.as_deref()) else {
        return Ok(None);
    };
    let Some(start_literal) = to_timestamp_literal(row.event_datetime_start.as_deref()) else {
        return Ok(None);
    };

    let result = sqlx::query(
        r#"
        INSERT INTO event_instances (
            event_name, event_datetime_start, event_datetime_end,
            event_location, event_capacity, event_registration_deadline
        )
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_name, event_datetime_start) DO NOTHING
        "#,
    )
    .bind(event_name)
    .bind(&start_literal)
    .bind(to_timestamp_literal(row.event_datetime_end.as_deref()))
    .bind(to_null_if_blank(row.event_location.as_deref()))
    .bind(parse_int_or_null(row.event_capacity.as_deref()))
    .bind(to_timestamp_literal(row.event_registration_deadline.as_deref()))
    .execute(&mut *conn)
    .await?;

    let instance_id: i64 = sqlx::query_scalar(
        "SELECT instance_id FROM event_instances
         WHERE event_name = ? AND event_datetime_start = ?",
    )
    .bind(event_name)
    .bind(&start_literal)
    .fetch_one(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(event_name, start = %start_literal, instance_id, "Reusing existing event instance");
    } else {
        debug!(event_name, start = %start_literal, instance_id, "Inserted new event instance");
    }

    Ok(Some(instance_id))
}
