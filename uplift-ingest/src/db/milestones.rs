//! Milestone resolution and ordinal recomputation
//!
//! A CSV cell may hold several milestones as semicolon-delimited title and
//! date lists, zipped by position. The natural key is
//! `(participant_id, title, date)` with NULL-aware matching, since either
//! half of an entry may be absent. `milestone_no` is not a counter: after
//! every batch it is recomputed for the whole participant from ascending
//! `(date, id)` order, so repeated runs converge to the same ordinals.

use crate::normalize::{to_date_literal, to_null_if_blank};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// Split a row's milestone lists into entries and insert each missing one,
/// then recompute the participant's ordinals.
pub async fn resolve_milestones(
    conn: &mut SqliteConnection,
    participant_id: i64,
    row: &StagedRow,
) -> Result<usize> {
    let titles_raw = to_null_if_blank(row.milestone_titles.as_deref());
    let dates_raw = to_null_if_blank(row.milestone_dates.as_deref());

    if titles_raw.is_none() && dates_raw.is_none() {
        debug!(participant_id, "No milestone data, skipping");
        return Ok(0);
    }

    let titles: Vec<&str> = titles_raw
        .map(|t| t.split(';').map(str::trim).collect())
        .unwrap_or_default();
    let dates: Vec<&str> = dates_raw
        .map(|d| d.split(';').map(str::trim).collect())
        .unwrap_or_default();

    let mut inserted = 0usize;
    for i in 0..titles.len().max(dates.len()) {
        let title = titles.get(i).copied().and_then(|t| to_null_if_blank(Some(t)));
        let date = dates.get(i).copied().and_then(|d| to_date_literal(Some(d)));

        // An entry with neither a title nor a parseable date is unusable
        if title.is_none() && date.is_none() {
            continue;
        }

        // NULL-aware natural-key check: `IS ?` matches NULL = NULL, which
        // `=` would not
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT milestone_id FROM participant_milestones
             WHERE participant_id = ? AND milestone_title IS ? AND milestone_date IS ?",
        )
        .bind(participant_id)
        .bind(&title)
        .bind(&date)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(milestone_id) = existing {
            debug!(participant_id, milestone_id, ?title, ?date, "Skipping duplicate milestone");
            continue;
        }

        sqlx::query(
            "INSERT INTO participant_milestones
             (participant_id, milestone_no, milestone_title, milestone_date)
             VALUES (?, 0, ?, ?)",
        )
        .bind(participant_id)
        .bind(&title)
        .bind(&date)
        .execute(&mut *conn)
        .await?;
        inserted += 1;
    }

    recompute_milestone_ordinals(conn, participant_id).await?;

    Ok(inserted)
}

/// Rewrite `milestone_no` for all of a participant's milestones as a
/// 1-based ordinal in ascending `(date, id)` order, NULL dates last.
pub async fn recompute_milestone_ordinals(
    conn: &mut SqliteConnection,
    participant_id: i64,
) -> Result<()> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT milestone_id FROM participant_milestones
         WHERE participant_id = ?
         ORDER BY (milestone_date IS NULL), milestone_date ASC, milestone_id ASC",
    )
    .bind(participant_id)
    .fetch_all(&mut *conn)
    .await?;

    for (index, milestone_id) in ids.iter().enumerate() {
        sqlx::query("UPDATE participant_milestones SET milestone_no = ? WHERE milestone_id = ?")
            .bind((index + 1) as i64)
            .bind(milestone_id)
            .execute(&mut *conn)
            .await?;
    }

    debug!(participant_id, count = ids.len(), "Recomputed milestone ordinals");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn pool_with_participant() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        uplift_common::db::init::create_participants_table(&pool)
            .await
            .unwrap();
        uplift_common::db::init::create_participant_milestones_table(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO participants (participant_email) VALUES ('a@x.com')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn milestone_row(titles: &str, dates: &str) -> StagedRow {
        StagedRow {
            milestone_titles: Some(titles.to_string()),
            milestone_dates: Some(dates.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_split_zip_and_ordinals() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        // Later date listed first; ordinals must follow dates, not input order
        let row = milestone_row("Certified;Graduated", "2024-06-01;2024-05-01");
        let inserted = resolve_milestones(&mut conn, 1, &row).await.unwrap();
        assert_eq!(inserted, 2);

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT milestone_title, milestone_no FROM participant_milestones
             WHERE participant_id = 1 ORDER BY milestone_no",
        )
        .fetch_all(&mut *conn)
        .await
        .unwrap();
        assert_eq!(rows, vec![("Graduated".to_string(), 1), ("Certified".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_duplicate_entries_not_reinserted() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        let row = milestone_row("Graduated", "2024-05-01");
        assert_eq!(resolve_milestones(&mut conn, 1, &row).await.unwrap(), 1);
        assert_eq!(resolve_milestones(&mut conn, 1, &row).await.unwrap(), 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participant_milestones")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_title_without_date_is_kept_nulls_last() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        resolve_milestones(&mut conn, 1, &milestone_row("Undated;Dated", ";2024-05-01"))
            .await
            .unwrap();

        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT milestone_title, milestone_no FROM participant_milestones
             WHERE participant_id = 1 ORDER BY milestone_no",
        )
        .fetch_all(&mut *conn)
        .await
        .unwrap();
        // NULL dates sort after dated entries
        assert_eq!(rows, vec![("Dated".to_string(), 1), ("Undated".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_empty_entries_skipped() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        let inserted = resolve_milestones(&mut conn, 1, &milestone_row(";;", ";garbled;"))
            .await
            .unwrap();
        assert_eq!(inserted, 0);
    }
}
