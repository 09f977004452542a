use anyhow::Context;
use sqlx::{FromRow, SqlitePool};
use time::Time;

use crate::domain::{
    format_time_hm, weekdays_from_csv, AlertSchedule, AlertType, DATE_FORMAT, TIME_FORMAT,
};
use crate::validate::NewAlert;

#[derive(Debug, Clone, FromRow)]
struct AlertRow {
    id: i64,
    user_id: i64,
    alert_type: String,
    alert_time: String,
    days: String,
    alert_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub id: i64,
    pub user_id: i64,
    pub alert_type: AlertType,
    pub alert_time: Time,
    pub schedule: AlertSchedule,
}

impl TryFrom<AlertRow> for Alert {
    type Error = anyhow::Error;

    fn try_from(row: AlertRow) -> anyhow::Result<Self> {
        let alert_type = AlertType::from_slug(&row.alert_type)
            .with_context(|| format!("alert {}: unknown type {:?}", row.id, row.alert_type))?;
        let alert_time = Time::parse(&row.alert_time, TIME_FORMAT)
            .with_context(|| format!("alert {}: bad time {:?}", row.id, row.alert_time))?;
        // a stored date wins; otherwise the weekday set applies
        let schedule = match row.alert_date.as_deref() {
            Some(raw) => AlertSchedule::Once(
                time::Date::parse(raw, DATE_FORMAT)
                    .with_context(|| format!("alert {}: bad date {:?}", row.id, raw))?,
            ),
            None => AlertSchedule::Weekly(weekdays_from_csv(&row.days)),
        };
        Ok(Alert {
            id: row.id,
            user_id: row.user_id,
            alert_type,
            alert_time,
            schedule,
        })
    }
}

pub async fn insert(db: &SqlitePool, user_id: i64, new: &NewAlert) -> anyhow::Result<Alert> {
    let row = sqlx::query_as::<_, AlertRow>(
        r#"
        INSERT INTO alerts (user_id, alert_type, alert_time, days, alert_date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, user_id, alert_type, alert_time, days, alert_date
        "#,
    )
    .bind(user_id)
    .bind(new.alert_type.as_str())
    .bind(format_time_hm(new.alert_time))
    .bind(new.schedule.days_column())
    .bind(new.schedule.date_column())
    .fetch_one(db)
    .await
    .context("insert alert")?;
    row.try_into()
}

pub async fn list_by_user(db: &SqlitePool, user_id: i64) -> anyhow::Result<Vec<Alert>> {
    let rows = sqlx::query_as::<_, AlertRow>(
        r#"
        SELECT id, user_id, alert_type, alert_time, days, alert_date
        FROM alerts
        WHERE user_id = ?1
        ORDER BY alert_time ASC, id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Alert::try_from).collect()
}

/// Scoped to `(id, owner)`: touching another user's alert affects zero rows
/// and reports `false`, never a cross-user mutation.
pub async fn update(
    db: &SqlitePool,
    user_id: i64,
    alert_id: i64,
    new: &NewAlert,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE alerts
        SET alert_type = ?3, alert_time = ?4, days = ?5, alert_date = ?6
        WHERE id = ?1 AND user_id = ?2
        "#,
    )
    .bind(alert_id)
    .bind(user_id)
    .bind(new.alert_type.as_str())
    .bind(format_time_hm(new.alert_time))
    .bind(new.schedule.days_column())
    .bind(new.schedule.date_column())
    .execute(db)
    .await
    .context("update alert")?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(db: &SqlitePool, user_id: i64, alert_id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM alerts WHERE id = ?1 AND user_id = ?2")
        .bind(alert_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Weekday;
    use crate::testutil;
    use time::macros::{date, time};

    fn weekly(days: &[Weekday]) -> NewAlert {
        NewAlert {
            alert_type: AlertType::Medicacao,
            alert_time: time!(08:00),
            schedule: AlertSchedule::Weekly(days.iter().copied().collect()),
        }
    }

    #[tokio::test]
    async fn insert_round_trips_both_schedule_shapes() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;

        let a = insert(&db, uid, &weekly(&[Weekday::Mon, Weekday::Wed])).await.unwrap();
        assert_eq!(a.schedule.weekday_slugs(), vec!["mon", "wed"]);
        assert_eq!(a.schedule.date(), None);

        let dated = NewAlert {
            alert_type: AlertType::Consulta,
            alert_time: time!(14:00),
            schedule: AlertSchedule::Once(date!(2024 - 02 - 15)),
        };
        let b = insert(&db, uid, &dated).await.unwrap();
        assert_eq!(b.schedule.date(), Some(date!(2024 - 02 - 15)));
        assert!(b.schedule.weekday_slugs().is_empty());

        assert_eq!(list_by_user(&db, uid).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cross_user_update_and_delete_are_noops() {
        let db = testutil::pool().await;
        let owner = testutil::seed_user(&db, "ana").await;
        let intruder = testutil::seed_user(&db, "bia").await;

        let alert = insert(&db, owner, &weekly(&[Weekday::Mon])).await.unwrap();

        let changed = NewAlert {
            alert_type: AlertType::Exercicio,
            alert_time: time!(20:00),
            schedule: AlertSchedule::Weekly([Weekday::Sun].into_iter().collect()),
        };
        assert!(!update(&db, intruder, alert.id, &changed).await.unwrap());
        assert!(!delete(&db, intruder, alert.id).await.unwrap());

        // the owner's alert is unchanged
        let alerts = list_by_user(&db, owner).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Medicacao);
        assert_eq!(alerts[0].alert_time, time!(08:00));

        // and the owner can still change it
        assert!(update(&db, owner, alert.id, &changed).await.unwrap());
        assert!(delete(&db, owner, alert.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_alerts() {
        let db = testutil::pool().await;
        let uid = testutil::seed_user(&db, "joao").await;
        insert(&db, uid, &weekly(&[Weekday::Fri])).await.unwrap();

        crate::users::repo::delete(&db, uid).await.unwrap();
        assert!(list_by_user(&db, uid).await.unwrap().is_empty());
    }
}
