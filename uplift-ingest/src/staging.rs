//! Raw ingestion mapper
//!
//! Maps arbitrary CSV header names onto the fixed canonical column set and
//! bulk-loads `staging_raw_rows`. No validation and no transformation
//! beyond string coercion happens here; cleanup belongs to the
//! normalization run.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info};

/// Rows are inserted in batches to avoid very large single transactions.
const BATCH_SIZE: usize = 500;

/// One staged CSV row, every canonical field present and nullable.
///
/// `row_id` is assigned by the database; rows built by [`map_row`] carry 0
/// until loaded.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct StagedRow {
    pub row_id: i64,
    pub participant_email: Option<String>,
    pub participant_first_name: Option<String>,
    pub participant_last_name: Option<String>,
    pub participant_dob: Option<String>,
    pub participant_role: Option<String>,
    pub participant_phone: Option<String>,
    pub participant_city: Option<String>,
    pub participant_state: Option<String>,
    pub participant_zip: Option<String>,
    pub participant_school_or_employer: Option<String>,
    pub participant_field_of_interest: Option<String>,
    pub event_name: Option<String>,
    pub event_type: Option<String>,
    pub event_description: Option<String>,
    pub event_recurrence_pattern: Option<String>,
    pub event_default_capacity: Option<String>,
    pub event_datetime_start: Option<String>,
    pub event_datetime_end: Option<String>,
    pub event_location: Option<String>,
    pub event_capacity: Option<String>,
    pub event_registration_deadline: Option<String>,
    pub registration_status: Option<String>,
    pub registration_attended_flag: Option<String>,
    pub registration_checkin_time: Option<String>,
    pub registration_created_at: Option<String>,
    pub survey_satisfaction_score: Option<String>,
    pub survey_usefulness_score: Option<String>,
    pub survey_instructor_score: Option<String>,
    pub survey_recommendation_score: Option<String>,
    pub survey_overall_score: Option<String>,
    pub survey_nps_bucket: Option<String>,
    pub survey_comments: Option<String>,
    pub survey_submission_date: Option<String>,
    pub milestone_titles: Option<String>,
    pub milestone_dates: Option<String>,
    pub donation_history: Option<String>,
    pub total_donations: Option<String>,
}

/// Strip a leading byte-order-mark and surrounding whitespace from a header
/// key. Excel in particular prefixes the first header with `\u{FEFF}`,
/// which would otherwise make `ParticipantEmail` unmatchable.
pub fn normalize_header_key(key: &str) -> &str {
    key.trim_start_matches('\u{feff}').trim()
}

/// Map one raw CSV row (header name -> cell text) onto the canonical
/// staged record. Unknown headers are ignored, missing headers become null.
pub fn map_row(raw: &HashMap<String, String>) -> StagedRow {
    let cleaned: HashMap<&str, &str> = raw
        .iter()
        .map(|(k, v)| (normalize_header_key(k), v.as_str()))
        .collect();

    let field = |header: &str| cleaned.get(header).map(|v| v.to_string());

    StagedRow {
        row_id: 0,
        participant_email: field("ParticipantEmail"),
        participant_first_name: field("ParticipantFirstName"),
        participant_last_name: field("ParticipantLastName"),
        participant_dob: field("ParticipantDOB"),
        participant_role: field("ParticipantRole"),
        participant_phone: field("ParticipantPhone"),
        participant_city: field("ParticipantCity"),
        participant_state: field("ParticipantState"),
        participant_zip: field("ParticipantZip"),
        participant_school_or_employer: field("ParticipantSchoolOrEmployer"),
        participant_field_of_interest: field("ParticipantFieldOfInterest"),
        event_name: field("EventName"),
        event_type: field("EventType"),
        event_description: field("EventDescription"),
        event_recurrence_pattern: field("EventRecurrencePattern"),
        event_default_capacity: field("EventDefaultCapacity"),
        event_datetime_start: field("EventDateTimeStart"),
        event_datetime_end: field("EventDateTimeEnd"),
        event_location: field("EventLocation"),
        event_capacity: field("EventCapacity"),
        event_registration_deadline: field("EventRegistrationDeadline"),
        registration_status: field("RegistrationStatus"),
        registration_attended_flag: field("RegistrationAttendedFlag"),
        registration_checkin_time: field("RegistrationCheckInTime"),
        registration_created_at: field("RegistrationCreatedAt"),
        survey_satisfaction_score: field("SurveySatisfactionScore"),
        survey_usefulness_score: field("SurveyUsefulnessScore"),
        survey_instructor_score: field("SurveyInstructorScore"),
        survey_recommendation_score: field("SurveyRecommendationScore"),
        survey_overall_score: field("SurveyOverallScore"),
        survey_nps_bucket: field("SurveyNPSBucket"),
        survey_comments: field("SurveyComments"),
        survey_submission_date: field("SurveySubmissionDate"),
        milestone_titles: field("MilestoneTitles"),
        milestone_dates: field("MilestoneDates"),
        donation_history: field("DonationHistory"),
        total_donations: field("TotalDonations"),
    }
}

/// Bulk-load already-parsed CSV rows into `staging_raw_rows`.
///
/// This is the collaborator contract with the upload transport: it accepts
/// a sequence of raw row mappings and returns only on success.
pub async fn load_staging_rows(
    pool: &SqlitePool,
    rows: &[HashMap<String, String>],
) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    info!(row_count = rows.len(), "Starting CSV -> staging load");

    let mapped: Vec<StagedRow> = rows.iter().map(map_row).collect();

    let mut loaded = 0usize;
    for (batch_index, batch) in mapped.chunks(BATCH_SIZE).enumerate() {
        debug!(batch_index, batch_size = batch.len(), "Inserting staging batch");
        let mut tx = pool.begin().await?;
        for row in batch {
            insert_staged_row(&mut tx, row).await?;
        }
        tx.commit().await?;
        loaded += batch.len();
    }

    info!(row_count = loaded, "Completed CSV -> staging load");

    Ok(loaded)
}

async fn insert_staged_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    row: &StagedRow,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO staging_raw_rows (
            participant_email, participant_first_name, participant_last_name,
            participant_dob, participant_role, participant_phone,
            participant_city, participant_state, participant_zip,
            participant_school_or_employer, participant_field_of_interest,
            event_name, event_type, event_description,
            event_recurrence_pattern, event_default_capacity,
            event_datetime_start, event_datetime_end, event_location,
            event_capacity, event_registration_deadline,
            registration_status, registration_attended_flag,
            registration_checkin_time, registration_created_at,
            survey_satisfaction_score, survey_usefulness_score,
            survey_instructor_score, survey_recommendation_score,
            survey_overall_score, survey_nps_bucket, survey_comments,
            survey_submission_date, milestone_titles, milestone_dates,
            donation_history, total_donations
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
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
    .bind(&row.event_name)
    .bind(&row.event_type)
    .bind(&row.event_description)
    .bind(&row.event_recurrence_pattern)
    .bind(&row.event_default_capacity)
    .bind(&row.event_datetime_start)
    .bind(&row.event_datetime_end)
    .bind(&row.event_location)
    .bind(&row.event_capacity)
    .bind(&row.event_registration_deadline)
    .bind(&row.registration_status)
    .bind(&row.registration_attended_flag)
    .bind(&row.registration_checkin_time)
    .bind(&row.registration_created_at)
    .bind(&row.survey_satisfaction_score)
    .bind(&row.survey_usefulness_score)
    .bind(&row.survey_instructor_score)
    .bind(&row.survey_recommendation_score)
    .bind(&row.survey_overall_score)
    .bind(&row.survey_nps_bucket)
    .bind(&row.survey_comments)
    .bind(&row.survey_submission_date)
    .bind(&row.milestone_titles)
    .bind(&row.milestone_dates)
    .bind(&row.donation_history)
    .bind(&row.total_donations)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Load every staged row in load order for a normalization run.
pub async fn load_all_staged(pool: &SqlitePool) -> Result<Vec<StagedRow>> {
    let rows = sqlx::query_as::<_, StagedRow>(
        "SELECT * FROM staging_raw_rows ORDER BY row_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Count of rows currently staged.
pub async fn count_staged(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staging_raw_rows")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header_key_strips_bom() {
        assert_eq!(normalize_header_key("\u{feff}ParticipantEmail"), "ParticipantEmail");
        assert_eq!(normalize_header_key("  EventName "), "EventName");
    }

    #[test]
    fn test_map_row_known_and_unknown_headers() {
        let mut raw = HashMap::new();
        raw.insert("\u{feff}ParticipantEmail".to_string(), "a@x.com".to_string());
        raw.insert("EventName".to_string(), "Workshop".to_string());
        raw.insert("SomethingElse".to_string(), "ignored".to_string());

        let mapped = map_row(&raw);
        assert_eq!(mapped.participant_email.as_deref(), Some("a@x.com"));
        assert_eq!(mapped.event_name.as_deref(), Some("Workshop"));
        assert_eq!(mapped.participant_first_name, None);
    }

    #[tokio::test]
    async fn test_load_and_read_back() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        uplift_common::db::init::create_staging_raw_rows_table(&pool)
            .await
            .unwrap();

        let mut raw = HashMap::new();
        raw.insert("ParticipantEmail".to_string(), "a@x.com".to_string());
        raw.insert("MilestoneTitles".to_string(), "Graduated;Certified".to_string());

        let loaded = load_staging_rows(&pool, &[raw]).await.unwrap();
        assert_eq!(loaded, 1);

        let staged = load_all_staged(&pool).await.unwrap();
        assert_eq!(staged.len(), 1);
        assert!(staged[0].row_id > 0);
        assert_eq!(staged[0].participant_email.as_deref(), Some("a@x.com"));
        assert_eq!(staged[0].milestone_titles.as_deref(), Some("Graduated;Certified"));
        assert_eq!(staged[0].event_name, None);
    }
}
