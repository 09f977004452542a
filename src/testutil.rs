//! Shared fixtures for unit tests: an in-memory store with the real schema
//! plus a few seed helpers.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use time::PrimitiveDateTime;

use crate::domain::{format_datetime, ActivityCategory};
use crate::validate::ProfileUpdate;

pub async fn pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("memory dsn")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("open in-memory database");
    crate::state::MIGRATOR.run(&pool).await.expect("run migrations");
    pool
}

pub fn profile(username: &str) -> ProfileUpdate {
    ProfileUpdate {
        name: username.to_string(),
        email: format!("{username}@email.com"),
        username: username.to_string(),
        phone: None,
        height: None,
        weight: None,
        diabetes_type: None,
        emergency_contact_name: None,
        emergency_contact_phone: None,
        emergency_contact_relation: None,
    }
}

pub async fn seed_user(db: &SqlitePool, username: &str) -> i64 {
    crate::users::repo::create(db, &profile(username), "hash")
        .await
        .expect("seed user")
        .id
}

pub async fn seed_measurement(db: &SqlitePool, user_id: i64, at: PrimitiveDateTime, level: f64) {
    sqlx::query(
        "INSERT INTO measurements (user_id, measured_at, glucose_level, measurement_context)
         VALUES (?1, ?2, ?3, 'em_jejum')",
    )
    .bind(user_id)
    .bind(format_datetime(at))
    .bind(level)
    .execute(db)
    .await
    .expect("seed measurement");
}

pub async fn seed_activity(
    db: &SqlitePool,
    user_id: i64,
    category: ActivityCategory,
    at: PrimitiveDateTime,
    minutes: i64,
) {
    sqlx::query(
        "INSERT INTO activities (user_id, category, performed_at, duration_minutes)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user_id)
    .bind(category.as_str())
    .bind(format_datetime(at))
    .bind(minutes)
    .execute(db)
    .await
    .expect("seed activity");
}
