//! Donation resolution and ordinal recomputation
//!
//! Donation history arrives as a semicolon-delimited list of `date:amount`
//! entries in one CSV cell. Natural key is
//! `(participant_id, date, amount)` with NULL-aware matching;
//! `donation_no` follows the same recomputed-ordinal rule as milestones.

use crate::normalize::{parse_float_or_null, to_date_literal, to_null_if_blank};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// Parse the row's donation history and insert each missing entry, then
/// recompute the participant's ordinals.
pub async fn resolve_donations(
    conn: &mut SqliteConnection,
    participant_id: i64,
    row: &StagedRow,
) -> Result<usize> {
    let Some(history_raw) = to_null_if_blank(row.donation_history.as_deref()) else {
        debug!(participant_id, "No donation history, skipping");
        return Ok(0);
    };

    let mut inserted = 0usize;
    for entry in history_raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.splitn(2, ':');
        let date = to_date_literal(parts.next());
        let amount = parts.next().and_then(|a| {
            // Currency symbols and separators are noise around the number
            let cleaned: String = a
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            parse_float_or_null(Some(&cleaned))
        });

        if date.is_none() && amount.is_none() {
            debug!(participant_id, entry, "Donation entry could not be parsed, skipping");
            continue;
        }

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT donation_id FROM participant_donations
             WHERE participant_id = ? AND donation_date IS ? AND donation_amount IS ?",
        )
        .bind(participant_id)
        .bind(&date)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(donation_id) = existing {
            debug!(participant_id, donation_id, ?date, ?amount, "Skipping duplicate donation");
            continue;
        }

        sqlx::query(
            "INSERT INTO participant_donations
             (participant_id, donation_no, donation_date, donation_amount)
             VALUES (?, 0, ?, ?)",
        )
        .bind(participant_id)
        .bind(&date)
        .bind(amount)
        .execute(&mut *conn)
        .await?;
        inserted += 1;
    }

    recompute_donation_ordinals(conn, participant_id).await?;

    Ok(inserted)
}

/// Rewrite `donation_no` for all of a participant's donations as a 1-based
/// ordinal in ascending `(date, id)` order, NULL dates last.
pub async fn recompute_donation_ordinals(
    conn: &mut SqliteConnection,
    participant_id: i64,
) -> Result<()> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT donation_id FROM participant_donations
         WHERE participant_id = ?
         ORDER BY (donation_date IS NULL), donation_date ASC, donation_id ASC",
    )
    .bind(participant_id)
    .fetch_all(&mut *conn)
    .await?;

    for (index, donation_id) in ids.iter().enumerate() {
        sqlx::query("UPDATE participant_donations SET donation_no = ? WHERE donation_id = ?")
            .bind((index + 1) as i64)
            .bind(donation_id)
            .execute(&mut *conn)
            .await?;
    }

    debug!(participant_id, count = ids.len(), "Recomputed donation ordinals");

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
        uplift_common::db::init::create_participant_donations_table(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO participants (participant_email) VALUES ('a@x.com')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn donation_row(history: &str) -> StagedRow {
        StagedRow {
            donation_history: Some(history.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_history_split_and_ordinals() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        let row = donation_row("2024-06-01:$50.00;2024-01-15:25");
        let inserted = resolve_donations(&mut conn, 1, &row).await.unwrap();
        assert_eq!(inserted, 2);

        let rows: Vec<(String, f64, i64)> = sqlx::query_as(
            "SELECT donation_date, donation_amount, donation_no
             FROM participant_donations WHERE participant_id = 1 ORDER BY donation_no",
        )
        .fetch_all(&mut *conn)
        .await
        .unwrap();
        assert_eq!(
            rows,
            vec![
                ("2024-01-15".to_string(), 25.0, 1),
                ("2024-06-01".to_string(), 50.0, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_entries_not_reinserted() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        let row = donation_row("2024-06-01:50");
        assert_eq!(resolve_donations(&mut conn, 1, &row).await.unwrap(), 1);
        assert_eq!(resolve_donations(&mut conn, 1, &row).await.unwrap(), 0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participant_donations")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_unparseable_entries_skipped() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        let inserted = resolve_donations(&mut conn, 1, &donation_row("gift:lots;;nonsense"))
            .await
            .unwrap();
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn test_amount_without_date_is_kept() {
        let pool = pool_with_participant().await;
        let mut conn = pool.acquire().await.unwrap();

        let inserted = resolve_donations(&mut conn, 1, &donation_row("someday:100"))
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let (date, amount): (Option<String>, f64) = sqlx::query_as(
            "SELECT donation_date, donation_amount FROM participant_donations
             WHERE participant_id = 1",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert_eq!(date, None);
        assert_eq!(amount, 100.0);
    }
}
