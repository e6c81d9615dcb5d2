//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the staging,
//! normalized, audit, and archive tables. All creation functions are
//! idempotent (`CREATE TABLE IF NOT EXISTS`) and public so tests can build
//! only the tables they need.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps readers unblocked while the single writer runs
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_all_tables(&pool).await?;

    Ok(pool)
}

/// Create every Uplift table (idempotent, safe to call on every startup)
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    // Independent tables first, then FK dependents
    create_participants_table(pool).await?;
    create_event_types_table(pool).await?;
    create_event_instances_table(pool).await?;
    create_attendance_instances_table(pool).await?;
    create_survey_instances_table(pool).await?;
    create_participant_milestones_table(pool).await?;
    create_participant_donations_table(pool).await?;

    // Staging, audit, archive
    create_staging_raw_rows_table(pool).await?;
    create_normalization_audit_table(pool).await?;
    create_staging_archive_table(pool).await?;

    info!("Database tables initialized");

    Ok(())
}

/// Participants, deduplicated by email (natural key)
pub async fn create_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            participant_id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_email TEXT NOT NULL UNIQUE,
            participant_first_name TEXT,
            participant_last_name TEXT,
            participant_dob TEXT,
            participant_role TEXT,
            participant_phone TEXT,
            participant_city TEXT,
            participant_state TEXT,
            participant_zip TEXT,
            participant_school_or_employer TEXT,
            participant_field_of_interest TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Event types, keyed directly by event name (no surrogate id)
pub async fn create_event_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_types (
            event_name TEXT PRIMARY KEY,
            event_type TEXT,
            event_description TEXT,
            event_recurrence_pattern TEXT,
            event_default_capacity INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Event instances, unique per (event_name, literal start timestamp)
pub async fn create_event_instances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_instances (
            instance_id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_name TEXT NOT NULL REFERENCES event_types(event_name),
            event_datetime_start TEXT NOT NULL,
            event_datetime_end TEXT,
            event_location TEXT,
            event_capacity INTEGER,
            event_registration_deadline TEXT,
            UNIQUE(event_name, event_datetime_start)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Attendance, one record per (participant, event instance)
pub async fn create_attendance_instances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_instances (
            attendance_id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_id INTEGER NOT NULL
                REFERENCES participants(participant_id) ON DELETE CASCADE,
            instance_id INTEGER NOT NULL REFERENCES event_instances(instance_id),
            event_datetime_start TEXT,
            registration_status TEXT,
            registration_attended INTEGER,
            registration_checkin_time TEXT,
            registration_created_at TEXT,
            UNIQUE(participant_id, instance_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Surveys, at most one per attendance record (PK = FK)
pub async fn create_survey_instances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS survey_instances (
            attendance_id INTEGER PRIMARY KEY
                REFERENCES attendance_instances(attendance_id) ON DELETE CASCADE,
            survey_satisfaction_score REAL,
            survey_usefulness_score REAL,
            survey_instructor_score REAL,
            survey_recommendation_score REAL,
            survey_overall_score REAL,
            survey_nps_bucket TEXT
                CHECK (survey_nps_bucket IN ('Promoter', 'Passive', 'Detractor')),
            survey_comments TEXT,
            survey_submission_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Milestones; milestone_no is recomputed per batch, not counted up
pub async fn create_participant_milestones_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participant_milestones (
            milestone_id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_id INTEGER NOT NULL
                REFERENCES participants(participant_id) ON DELETE CASCADE,
            milestone_no INTEGER,
            milestone_title TEXT,
            milestone_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Donations; donation_no is recomputed per batch, not counted up
pub async fn create_participant_donations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participant_donations (
            donation_id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_id INTEGER NOT NULL
                REFERENCES participants(participant_id) ON DELETE CASCADE,
            donation_no INTEGER,
            donation_date TEXT,
            donation_amount REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Raw staging table: every column TEXT, no validation at load time
pub async fn create_staging_raw_rows_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS staging_raw_rows (\n\
         row_id INTEGER PRIMARY KEY AUTOINCREMENT,\n{}\n)",
        staging_text_columns_ddl()
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit of dropped/partially-processed staging rows, reset each run
pub async fn create_normalization_audit_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS normalization_audit (
            audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_id INTEGER NOT NULL,
            reason TEXT NOT NULL,
            participant_email TEXT,
            participant_first_name TEXT,
            participant_last_name TEXT,
            participant_dob TEXT,
            participant_role TEXT,
            participant_phone TEXT,
            participant_city TEXT,
            participant_state TEXT,
            participant_zip TEXT,
            participant_school_or_employer TEXT,
            participant_field_of_interest TEXT,
            logged_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Permanent archive of every staged row ever processed
pub async fn create_staging_archive_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS staging_archive (\n\
         archive_id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         archived_at TEXT NOT NULL DEFAULT (datetime('now')),\n\
         original_row_id INTEGER,\n{}\n)",
        staging_text_columns_ddl()
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// The canonical staging column vocabulary, in load order.
///
/// Shared between the staging and archive DDL and the ingest crate's
/// column-by-column mapper and archiver.
pub const STAGING_COLUMNS: [&str; 37] = [
    "participant_email",
    "participant_first_name",
    "participant_last_name",
    "participant_dob",
    "participant_role",
    "participant_phone",
    "participant_city",
    "participant_state",
    "participant_zip",
    "participant_school_or_employer",
    "participant_field_of_interest",
    "event_name",
    "event_type",
    "event_description",
    "event_recurrence_pattern",
    "event_default_capacity",
    "event_datetime_start",
    "event_datetime_end",
    "event_location",
    "event_capacity",
    "event_registration_deadline",
    "registration_status",
    "registration_attended_flag",
    "registration_checkin_time",
    "registration_created_at",
    "survey_satisfaction_score",
    "survey_usefulness_score",
    "survey_instructor_score",
    "survey_recommendation_score",
    "survey_overall_score",
    "survey_nps_bucket",
    "survey_comments",
    "survey_submission_date",
    "milestone_titles",
    "milestone_dates",
    "donation_history",
    "total_donations",
];

fn staging_text_columns_ddl() -> String {
    STAGING_COLUMNS
        .iter()
        .map(|c| format!("    {} TEXT", c))
        .collect::<Vec<_>>()
        .join(",\n")
}
