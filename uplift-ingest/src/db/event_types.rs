//! Event type resolution
//!
//! Event types use the event name itself as the primary key; there is no
//! surrogate id. A type is never updated once created.

use crate::normalize::{parse_int_or_null, to_null_if_blank};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// Ensure the event type for this row's event name exists, returning the
/// name (its key). `None` when the row has no event name.
pub async fn resolve_event_type(
    conn: &mut SqliteConnection,
    row: &StagedRow,
) -> Result<Option<String>> {
    let Some(event_name) = to_null_if_blank(row.event_name.as_deref()) else {
        return Ok(None);
    };

    let result = sqlx::query(
        r#"
        INSERT INTO event_types (
            event_name, event_type, event_description,
            event_recurrence_pattern, event_default_capacity
        )
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(event_name) DO NOTHING
        "#,
    )
    .bind(event_name)
    .bind(to_null_if_blank(row.event_type.as_deref()))
    .bind(to_null_if_blank(row.event_description.as_deref()))
    .bind(to_null_if_blank(row.event_recurrence_pattern.as_deref()))
    .bind(parse_int_or_null(row.event_default_capacity.as_deref()))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(event_name, "Reusing existing event type");
    } else {
        debug!(event_name, "Inserted new event type");
    }

    Ok(Some(event_name.to_string()))
}
