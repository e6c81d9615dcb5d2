//! Attendance resolution
//!
//! One attendance record per `(participant, event instance)` pair.

use crate::normalize::{parse_boolean, to_null_if_blank, to_timestamp_literal};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// Ensure there is a single attendance record tying a participant to an
/// event instance, returning its id.
pub async fn resolve_attendance(
    conn: &mut SqliteConnection,
    participant_id: i64,
    instance_id: i64,
    row: &StagedRow,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_instances (
            participant_id, instance_id, event_datetime_start,
            registration_status, registration_attended,
            registration_checkin_time, registration_created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(participant_id, instance_id) DO NOTHING
        "#,
    )
    .bind(participant_id)
    .bind(instance_id)
    .bind(to_timestamp_literal(row.event_datetime_start.as_deref()))
    .bind(to_null_if_blank(row.registration_status.as_deref()))
    .bind(parse_boolean(row.registration_attended_flag.as_deref()))
    .bind(to_timestamp_literal(row.registration_checkin_time.as_deref()))
    .bind(to_timestamp_literal(row.registration_created_at.as_deref()))
    .execute(&mut *conn)
    .await?;

    let attendance_id: i64 = sqlx::query_scalar(
        "SELECT attendance_id FROM attendance_instances
         WHERE participant_id = ? AND instance_id = ?",
    )
    .bind(participant_id)
    .bind(instance_id)
    .fetch_one(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(participant_id, instance_id, attendance_id, "Reusing existing attendance");
    } else {
        debug!(participant_id, instance_id, attendance_id, "Inserted new attendance");
    }

    Ok(attendance_id)
}
