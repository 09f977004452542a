use anyhow::Context;
use sqlx::{FromRow, SqlitePool};
use time::PrimitiveDateTime;

use crate::domain::{format_datetime, MeasurementContext, MonthKey, DATETIME_FORMAT};
use crate::validate::NewMeasurement;

#[derive(Debug, Clone, FromRow)]
struct MeasurementRow {
    id: i64,
    user_id: i64,
    measured_at: String,
    glucose_level: f64,
    measurement_context: String,
    notes: Option<String>,
}

/// A glucose reading. Immutable once created.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub id: i64,
    pub user_id: i64,
    pub measured_at: PrimitiveDateTime,
    pub glucose_level: f64,
    /// `None` when the stored context slug is no longer recognized; the
    /// aggregator groups those under a placeholder label.
    pub context: Option<MeasurementContext>,
    pub notes: Option<String>,
}

impl TryFrom<MeasurementRow> for Measurement {
    type Error = anyhow::Error;

    fn try_from(row: MeasurementRow) -> anyhow::Result<Self> {
        let measured_at = PrimitiveDateTime::parse(&row.measured_at, DATETIME_FORMAT)
            .with_context(|| {
                format!("measurement {}: bad measured_at {:?}", row.id, row.measured_at)
            })?;
        Ok(Measurement {
            id: row.id,
            user_id: row.user_id,
            measured_at,
            glucose_level: row.glucose_level,
            context: MeasurementContext::from_slug(&row.measurement_context),
            notes: row.notes,
        })
    }
}

pub async fn insert(
    db: &SqlitePool,
    user_id: i64,
    new: &NewMeasurement,
) -> anyhow::Result<Measurement> {
    let row = sqlx::query_as::<_, MeasurementRow>(
        r#"
        INSERT INTO measurements (user_id, measured_at, glucose_level, measurement_context, notes)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, user_id, measured_at, glucose_level, measurement_context, notes
        "#,
    )
    .bind(user_id)
    .bind(format_datetime(new.measured_at))
    .bind(new.glucose_level)
    .bind(new.context.as_str())
    .bind(&new.notes)
    .fetch_one(db)
    .await
    .context("insert measurement")?;
    row.try_into()
}

/// Newest first. `limit = None` returns everything (SQLite treats a negative
/// LIMIT as unbounded).
pub async fn list_by_user(
    db: &SqlitePool,
    user_id: i64,
    limit: Option<i64>,
) -> anyhow::Result<Vec<Measurement>> {
    let rows = sqlx::query_as::<_, MeasurementRow>(
        r#"
        SELECT id, user_id, measured_at, glucose_level, measurement_context, notes
        FROM measurements
        WHERE user_id = ?1
        ORDER BY measured_at DESC, id DESC
        LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(limit.unwrap_or(-1))
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Measurement::try_from).collect()
}

/// All readings within the calendar month, for the aggregator. The stored
/// `YYYY-MM-DD HH:MM` text compares lexicographically in time order.
pub async fn list_for_month(
    db: &SqlitePool,
    user_id: i64,
    month: MonthKey,
) -> anyhow::Result<Vec<Measurement>> {
    let rows = sqlx::query_as::<_, MeasurementRow>(
        r#"
        SELECT id, user_id, measured_at, glucose_level, measurement_context, notes
        FROM measurements
        WHERE user_id = ?1 AND measured_at >= ?2 AND measured_at < ?3
        ORDER BY measured_at ASC, id ASC
        "#,
    )
    .bind(user_id)
    .bind(format_datetime(month.start()))
    .bind(format_datetime(month.next().start()))
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Measurement::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use time::macros::datetime;

    #[tokio::test]
    async fn insert_and_list_newest_first() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;

        testutil::seed_measurement(&db, uid, datetime!(2024-01-14 08:00), 88.0).await;
        testutil::seed_measurement(&db, uid, datetime!(2024-01-15 08:00), 95.0).await;

        let all = list_by_user(&db, uid, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].glucose_level, 95.0);

        let capped = list_by_user(&db, uid, Some(1)).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].measured_at, datetime!(2024-01-15 08:00));
    }

    #[tokio::test]
    async fn month_range_is_half_open() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;

        testutil::seed_measurement(&db, uid, datetime!(2023-12-31 23:59), 80.0).await;
        testutil::seed_measurement(&db, uid, datetime!(2024-01-01 00:00), 90.0).await;
        testutil::seed_measurement(&db, uid, datetime!(2024-01-31 08:00), 100.0).await;
        testutil::seed_measurement(&db, uid, datetime!(2024-02-01 00:00), 110.0).await;

        let month = MonthKey::parse("2024-01").unwrap();
        let rows = list_for_month(&db, uid, month).await.unwrap();
        let values: Vec<f64> = rows.iter().map(|m| m.glucose_level).collect();
        assert_eq!(values, vec![90.0, 100.0]);
    }

    #[tokio::test]
    async fn rows_are_scoped_to_their_owner() {
        let db = testutil::pool().await;
        let a = testutil::seed_user(&db, "ana").await;
        let b = testutil::seed_user(&db, "bia").await;
        testutil::seed_measurement(&db, a, datetime!(2024-01-15 08:00), 95.0).await;

        assert_eq!(list_by_user(&db, a, None).await.unwrap().len(), 1);
        assert!(list_by_user(&db, b, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_context_decodes_as_none() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;
        sqlx::query(
            "INSERT INTO measurements (user_id, measured_at, glucose_level, measurement_context)
             VALUES (?1, '2024-01-15 08:00', 95.0, 'contexto_antigo')",
        )
        .bind(uid)
        .execute(&db)
        .await
        .unwrap();

        let rows = list_by_user(&db, uid, None).await.unwrap();
        assert_eq!(rows[0].context, None);
    }
}
