//! Run orchestrator
//!
//! Drives a normalization run over everything in `staging_raw_rows`:
//! reset the audit table, resolve each staged row into the normalized
//! tables, then archive the batch and clear staging. Runs are single-writer
//! and strictly sequential; later rows may depend on entities created by
//! earlier rows in the same batch.
//!
//! Each row's full resolution cascade runs inside one transaction, so a
//! crash mid-row cannot leave partial state (an attendance without its
//! survey). The archive-and-truncate step at the end is one transaction as
//! well. Unrecoverable errors abort the remaining run with staging left
//! un-truncated, which is safe to re-run because every resolver is
//! idempotent by natural key.

use crate::audit::{
    audit_drop, REASON_INVALID_EVENT_START, REASON_MISSING_EMAIL, REASON_MISSING_EVENT_NAME,
};
use crate::normalize::{parse_date_time, to_null_if_blank};
use crate::staging::{self, StagedRow};
use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Outcome of one normalization run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Rows found in staging at the start of the run
    pub staged: usize,
    /// Rows whose participant branch resolved
    pub processed: usize,
    /// Rows dropped entirely for lack of a participant email
    pub skipped_missing_email: usize,
    /// Rows copied into the permanent archive
    pub archived: u64,
}

/// Run the full staging-to-normalized pipeline.
pub async fn run_normalization(pool: &SqlitePool) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("normalization_run", run_id = %run_id);
    run_inner(pool, run_id).instrument(span).await
}

async fn run_inner(pool: &SqlitePool, run_id: Uuid) -> Result<RunSummary> {
    info!("Normalization run started");

    // Audit reset: the audit table reflects only the most recent run.
    // Failure here is non-fatal.
    if let Err(e) = sqlx::query("DELETE FROM normalization_audit").execute(pool).await {
        warn!(error = %e, "Failed to reset normalization_audit, continuing");
    }

    let rows = staging::load_all_staged(pool).await?;
    info!(row_count = rows.len(), "Loaded rows from staging");

    let mut processed = 0usize;
    let mut skipped_missing_email = 0usize;

    for row in &rows {
        if process_row(pool, row).await? {
            processed += 1;
        } else {
            skipped_missing_email += 1;
        }
    }

    info!(processed, skipped_missing_email, "Finished per-row normalization");

    let archived = archive_and_clear(pool).await?;

    info!(archived, "Normalization run completed");

    Ok(RunSummary {
        run_id,
        staged: rows.len(),
        processed,
        skipped_missing_email,
        archived,
    })
}

/// Resolve one staged row inside its own transaction. Returns false when
/// the row was dropped for a missing participant email.
async fn process_row(pool: &SqlitePool, row: &StagedRow) -> Result<bool> {
    let mut tx = pool.begin().await?;

    // No email: nothing downstream can attach to a participant, so the
    // milestone and donation branches are skipped too.
    if to_null_if_blank(row.participant_email.as_deref()).is_none() {
        audit_drop(&mut tx, row, REASON_MISSING_EMAIL).await;
        tx.commit().await?;
        info!(row_id = row.row_id, "Skipping row with missing participant email");
        return Ok(false);
    }

    let Some(participant_id) = crate::db::participants::resolve_participant(&mut tx, row).await?
    else {
        // Unreachable given the check above; treated the same as a drop
        audit_drop(&mut tx, row, REASON_MISSING_EMAIL).await;
        tx.commit().await?;
        return Ok(false);
    };

    // Event branch only with a name and a parseable start; participant,
    // milestone, and donation branches proceed regardless.
    let event_name = to_null_if_blank(row.event_name.as_deref());
    let event_start = parse_date_time(row.event_datetime_start.as_deref());

    let mut instance_id = None;
    let mut attendance_id = None;

    if event_name.is_some() && event_start.is_some() {
        crate::db::event_types::resolve_event_type(&mut tx, row).await?;
        instance_id = crate::db::event_instances::resolve_event_instance(&mut tx, row).await?;
        if let Some(instance_id) = instance_id {
            let att =
                crate::db::attendance::resolve_attendance(&mut tx, participant_id, instance_id, row)
                    .await?;
            crate::db::surveys::create_survey_if_needed(&mut tx, att, row).await?;
            attendance_id = Some(att);
        }
    } else {
        let reason = if event_name.is_none() {
            REASON_MISSING_EVENT_NAME
        } else {
            REASON_INVALID_EVENT_START
        };
        audit_drop(&mut tx, row, reason).await;
        info!(
            row_id = row.row_id,
            event_name,
            event_start_raw = row.event_datetime_start.as_deref(),
            "Skipping event/attendance/survey for row"
        );
    }

    // Milestones and donations depend only on the participant
    crate::db::milestones::resolve_milestones(&mut tx, participant_id, row).await?;
    crate::db::donations::resolve_donations(&mut tx, participant_id, row).await?;

    tx.commit().await?;

    info!(row_id = row.row_id, participant_id, ?instance_id, ?attendance_id, "Finished row");

    Ok(true)
}

/// Copy every staged row into the permanent archive (preserving `row_id`
/// as `original_row_id`) and truncate staging, atomically.
async fn archive_and_clear(pool: &SqlitePool) -> Result<u64> {
    let columns = uplift_common::db::init::STAGING_COLUMNS.join(", ");

    let mut tx = pool.begin().await?;

    let archived = sqlx::query(&format!(
        "INSERT INTO staging_archive (original_row_id, {columns})
         SELECT row_id, {columns} FROM staging_raw_rows"
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM staging_raw_rows").execute(&mut *tx).await?;

    tx.commit().await?;

    info!(archived, "Archived staging rows and cleared staging");

    Ok(archived)
}
