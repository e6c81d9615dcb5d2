//! Survey resolution
//!
//! A survey is 1:1 with its attendance record (primary key = foreign key)
//! and is only created when the row actually carries survey data. An
//! existing survey is never overwritten.

use crate::normalize::{
    normalize_nps_bucket, parse_float_or_null, to_null_if_blank, to_timestamp_literal,
};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// True if any of the row's survey score/comment/date fields is non-blank.
fn has_survey_data(row: &StagedRow) -> bool {
    [
        &row.survey_satisfaction_score,
        &row.survey_usefulness_score,
        &row.survey_instructor_score,
        &row.survey_recommendation_score,
        &row.survey_overall_score,
        &row.survey_nps_bucket,
        &row.survey_comments,
        &row.survey_submission_date,
    ]
    .iter()
    .any(|f| to_null_if_blank(f.as_deref()).is_some())
}

/// Create a survey for the attendance record if the row has survey fields.
/// Returns true if a new survey row was inserted.
pub async fn create_survey_if_needed(
    conn: &mut SqliteConnection,
    attendance_id: i64,
    row: &StagedRow,
) -> Result<bool> {
    if !has_survey_data(row) {
        debug!(attendance_id, "No survey fields present, skipping survey");
        return Ok(false);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO survey_instances (
            attendance_id, survey_satisfaction_score, survey_usefulness_score,
            survey_instructor_score, survey_recommendation_score,
            survey_overall_score, survey_nps_bucket, survey_comments,
            survey_submission_date
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(attendance_id) DO NOTHING
        "#,
    )
    .bind(attendance_id)
    .bind(parse_float_or_null(row.survey_satisfaction_score.as_deref()))
    .bind(parse_float_or_null(row.survey_usefulness_score.as_deref()))
    .bind(parse_float_or_null(row.survey_instructor_score.as_deref()))
    .bind(parse_float_or_null(row.survey_recommendation_score.as_deref()))
    .bind(parse_float_or_null(row.survey_overall_score.as_deref()))
    .bind(normalize_nps_bucket(row.survey_nps_bucket.as_deref()))
    .bind(to_null_if_blank(row.survey_comments.as_deref()))
    .bind(to_timestamp_literal(row.survey_submission_date.as_deref()))
    .execute(&mut *conn)
    .await?;

    let inserted = result.rows_affected() > 0;
    if inserted {
        debug!(attendance_id, "Inserted survey for attendance");
    } else {
        debug!(attendance_id, "Survey already exists for attendance, skipping insert");
    }

    Ok(inserted)
}
