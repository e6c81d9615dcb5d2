//! Audit recorder
//!
//! Rows that are dropped or only partially processed get one entry in
//! `normalization_audit` carrying the row's identity-bearing fields and a
//! human-readable reason. Auditing is diagnostic, not transactional: a
//! failed audit write is logged and swallowed so it cannot abort the run.

use crate::staging::StagedRow;
use sqlx::SqliteConnection;
use tracing::{info, warn};

/// Reason for a fully dropped row: nothing can be resolved without an email.
pub const REASON_MISSING_EMAIL: &str = "missing participant_email";
/// Reason when only the event/attendance/survey branch is skipped.
pub const REASON_MISSING_EVENT_NAME: &str =
    "missing event_name (skipped event/attendance/survey)";
/// Reason when the event start is absent or unparseable.
pub const REASON_INVALID_EVENT_START: &str =
    "missing or invalid event_datetime_start (skipped event/attendance/survey)";

/// Best-effort insert of one audit entry for a dropped/partial row.
pub async fn audit_drop(conn: &mut SqliteConnection, row: &StagedRow, reason: &str) {
    let result = sqlx::query(
        r#"
        INSERT INTO normalization_audit (
            row_id, reason, participant_email, participant_first_name,
            participant_last_name, participant_dob, participant_role,
            participant_phone, participant_city, participant_state,
            participant_zip, participant_school_or_employer,
            participant_field_of_interest
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(row.row_id)
    .bind(reason)
    .bind(&row.participant_email)
    .bind(&row.participant_first_name)
    .bind(&row.participant_last_name)
    .bind(&row.participant_dob)
    .bind(&row.participant_role)
    .bind(&row.participant_phone)
    .bind(&row.participant_city)
    .bind(&row.participant_state)
    .bind(&row.participant_zip)
    .bind(&row.participant_school_or_employer)
    .bind(&row.participant_field_of_interest)
    .execute(conn)
    .await;

    match result {
        Ok(_) => info!(row_id = row.row_id, reason, "Logged dropped/partial row"),
        Err(e) => warn!(row_id = row.row_id, reason, error = %e, "Failed to insert audit row"),
    }
}
