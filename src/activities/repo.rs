use anyhow::Context;
use sqlx::{FromRow, SqlitePool};
use time::PrimitiveDateTime;

use crate::domain::{format_datetime, ActivityCategory, MonthKey, DATETIME_FORMAT};
use crate::validate::NewActivity;

#[derive(Debug, Clone, FromRow)]
struct ActivityRow {
    id: i64,
    user_id: i64,
    category: String,
    performed_at: String,
    duration_minutes: i64,
}

/// A physical-activity entry. Immutable once created.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    pub category: Option<ActivityCategory>,
    pub performed_at: PrimitiveDateTime,
    pub duration_minutes: i64,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = anyhow::Error;

    fn try_from(row: ActivityRow) -> anyhow::Result<Self> {
        let performed_at = PrimitiveDateTime::parse(&row.performed_at, DATETIME_FORMAT)
            .with_context(|| {
                format!("activity {}: bad performed_at {:?}", row.id, row.performed_at)
            })?;
        Ok(Activity {
            id: row.id,
            user_id: row.user_id,
            category: ActivityCategory::from_slug(&row.category),
            performed_at,
            duration_minutes: row.duration_minutes,
        })
    }
}

pub async fn insert(db: &SqlitePool, user_id: i64, new: &NewActivity) -> anyhow::Result<Activity> {
    let row = sqlx::query_as::<_, ActivityRow>(
        r#"
        INSERT INTO activities (user_id, category, performed_at, duration_minutes)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id, user_id, category, performed_at, duration_minutes
        "#,
    )
    .bind(user_id)
    .bind(new.category.as_str())
    .bind(format_datetime(new.performed_at))
    .bind(new.duration_minutes)
    .fetch_one(db)
    .await
    .context("insert activity")?;
    row.try_into()
}

/// Newest first, optionally capped.
pub async fn list_by_user(
    db: &SqlitePool,
    user_id: i64,
    limit: Option<i64>,
) -> anyhow::Result<Vec<Activity>> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        r#"
        SELECT id, user_id, category, performed_at, duration_minutes
        FROM activities
        WHERE user_id = ?1
        ORDER BY performed_at DESC, id DESC
        LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(limit.unwrap_or(-1))
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Activity::try_from).collect()
}

pub async fn list_for_month(
    db: &SqlitePool,
    user_id: i64,
    month: MonthKey,
) -> anyhow::Result<Vec<Activity>> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        r#"
        SELECT id, user_id, category, performed_at, duration_minutes
        FROM activities
        WHERE user_id = ?1 AND performed_at >= ?2 AND performed_at < ?3
        ORDER BY performed_at ASC, id ASC
        "#,
    )
    .bind(user_id)
    .bind(format_datetime(month.start()))
    .bind(format_datetime(month.next().start()))
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Activity::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use time::macros::datetime;

    #[tokio::test]
    async fn insert_and_list() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;

        testutil::seed_activity(&db, uid, ActivityCategory::Caminhada, datetime!(2024-01-15 07:00), 30).await;
        testutil::seed_activity(&db, uid, ActivityCategory::Natacao, datetime!(2024-01-14 18:00), 45).await;

        let all = list_by_user(&db, uid, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].category, Some(ActivityCategory::Caminhada));
        assert_eq!(all[1].duration_minutes, 45);
    }

    #[tokio::test]
    async fn month_fetch_excludes_neighbouring_months() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;

        testutil::seed_activity(&db, uid, ActivityCategory::Ciclismo, datetime!(2023-12-30 16:00), 60).await;
        testutil::seed_activity(&db, uid, ActivityCategory::Caminhada, datetime!(2024-01-13 16:00), 30).await;

        let month = MonthKey::parse("2024-01").unwrap();
        let rows = list_for_month(&db, uid, month).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, Some(ActivityCategory::Caminhada));
    }
}
