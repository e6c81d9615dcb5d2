//! Participant resolution
//!
//! Participants are deduplicated by exact email match. Demographic fields
//! are written on first encounter only; later rows with the same email
//! reuse the id and never overwrite what is already stored.

use crate::normalize::{normalize_phone, to_date_literal, to_null_if_blank};
use crate::staging::StagedRow;
use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::debug;

/// Ensure there is exactly one participant per email and return its id.
/// Returns `None` when the row carries no usable email.
pub async fn resolve_participant(
    conn: &mut SqliteConnection,
    row: &StagedRow,
) -> Result<Option<i64>> {
    let Some(email) = to_null_if_blank(row.participant_email.as_deref()) else {
        return Ok(None);
    };

    // Upsert keyed on the natural unique constraint; a conflict means the
    // participant already exists and the insert is a no-op.
    let result = sqlx::query(
        r#"
        INSERT INTO participants (
            participant_email, participant_first_name, participant_last_name,
            participant_dob, participant_role, participant_phone,
            participant_city, participant_state, participant_zip,
            participant_school_or_employer, participant_field_of_interest
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(participant_email) DO NOTHING
        "#,
    )
    .bind(email)
    .bind(to_null_if_blank(row.participant_first_name.as_deref()))
    .bind(to_null_if_blank(row.participant_last_name.as_deref()))
    .bind(to_date_literal(row.participant_dob.as_deref()))
    .bind(to_null_if_blank(row.participant_role.as_deref()))
    .bind(normalize_phone(row.participant_phone.as_deref()))
    .bind(to_null_if_blank(row.participant_city.as_deref()))
    .bind(to_null_if_blank(row.participant_state.as_deref()))
    .bind(to_null_if_blank(row.participant_zip.as_deref()))
    .bind(to_null_if_blank(row.participant_school_or_employer.as_deref()))
    .bind(to_null_if_blank(row.participant_field_of_interest.as_deref()))
    .execute(&mut *conn)
    .await?;

    let participant_id: i64 =
        sqlx::query_scalar("SELECT participant_id FROM participants WHERE participant_email = ?")
            .bind(email)
            .fetch_one(&mut *conn)
            .await?;

    if result.rows_affected() == 0 {
        debug!(email, participant_id, "Reusing existing participant");
    } else {
        debug!(email, participant_id, "Inserted new participant");
    }

    Ok(Some(participant_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    fn row_with_email(email: &str) -> StagedRow {
        StagedRow {
            participant_email: Some(email.to_string()),
            participant_first_name: Some("Ada".to_string()),
            participant_phone: Some("(555) 123-4567".to_string()),
            participant_dob: Some("5/2/98".to_string()),
            ..Default::default()
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        uplift_common::db::init::create_participants_table(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_resolve_twice_is_idempotent() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let row = row_with_email("a@x.com");
        let id1 = resolve_participant(&mut conn, &row).await.unwrap().unwrap();
        let id2 = resolve_participant(&mut conn, &row).await.unwrap().unwrap();
        assert_eq!(id1, id2);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_missing_email_returns_none() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let row = StagedRow {
            participant_email: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_participant(&mut conn, &row).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_first_submission_wins() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        resolve_participant(&mut conn, &row_with_email("a@x.com"))
            .await
            .unwrap();

        let mut later = row_with_email("a@x.com");
        later.participant_first_name = Some("Someone Else".to_string());
        resolve_participant(&mut conn, &later).await.unwrap();

        let name: String = sqlx::query_scalar(
            "SELECT participant_first_name FROM participants WHERE participant_email = 'a@x.com'",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert_eq!(name, "Ada");
    }

    #[tokio::test]
    async fn test_normalized_fields_stored() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        resolve_participant(&mut conn, &row_with_email("a@x.com"))
            .await
            .unwrap();

        let (phone, dob): (String, String) = sqlx::query_as(
            "SELECT participant_phone, participant_dob FROM participants WHERE participant_email = 'a@x.com'",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert_eq!(phone, "5551234567");
        assert_eq!(dob, "1998-05-02");
    }
}
