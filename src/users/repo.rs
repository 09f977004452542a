use anyhow::Context;
use sqlx::{FromRow, SqlitePool};
use time::PrimitiveDateTime;

use crate::domain::{DiabetesType, EmergencyRelation, DATETIME_SECONDS_FORMAT};
use crate::validate::ProfileUpdate;

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    username: String,
    password_hash: String,
    phone: Option<String>,
    height: Option<f64>,
    weight: Option<f64>,
    diabetes_type: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
    emergency_contact_relation: Option<String>,
    active: i64,
    created_at: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub diabetes_type: Option<DiabetesType>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relation: Option<EmergencyRelation>,
    pub active: bool,
    pub created_at: PrimitiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> anyhow::Result<Self> {
        let created_at = PrimitiveDateTime::parse(&row.created_at, DATETIME_SECONDS_FORMAT)
            .with_context(|| format!("user {}: bad created_at {:?}", row.id, row.created_at))?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            phone: row.phone,
            height: row.height,
            weight: row.weight,
            // legacy rows may hold slugs we no longer recognize
            diabetes_type: row.diabetes_type.as_deref().and_then(DiabetesType::from_slug),
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
            emergency_contact_relation: row
                .emergency_contact_relation
                .as_deref()
                .and_then(EmergencyRelation::from_slug),
            active: row.active != 0,
            created_at,
        })
    }
}

/// True when the error chain bottoms out in a UNIQUE constraint hit. The
/// handlers probe uniqueness first, so this only fires on a write race.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}

const USER_COLUMNS: &str = "id, name, email, username, password_hash, phone, height, weight, \
     diabetes_type, emergency_contact_name, emergency_contact_phone, \
     emergency_contact_relation, active, created_at";

pub async fn create(
    db: &SqlitePool,
    profile: &ProfileUpdate,
    password_hash: &str,
) -> anyhow::Result<User> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (name, email, username, password_hash, phone, height, weight,
                           diabetes_type, emergency_contact_name, emergency_contact_phone,
                           emergency_contact_relation)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(&profile.username)
    .bind(password_hash)
    .bind(&profile.phone)
    .bind(profile.height)
    .bind(profile.weight)
    .bind(profile.diabetes_type.map(|v| v.as_str()))
    .bind(&profile.emergency_contact_name)
    .bind(&profile.emergency_contact_phone)
    .bind(profile.emergency_contact_relation.map(|v| v.as_str()))
    .fetch_one(db)
    .await
    .context("insert user")?;
    row.try_into()
}

pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    row.map(User::try_from).transpose()
}

pub async fn find_by_username(db: &SqlitePool, username: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
    ))
    .bind(username)
    .fetch_optional(db)
    .await?;
    row.map(User::try_from).transpose()
}

pub async fn find_by_email(db: &SqlitePool, email: &str) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
    ))
    .bind(email)
    .fetch_optional(db)
    .await?;
    row.map(User::try_from).transpose()
}

/// True when another record (excluding `exclude_id`, if given) already owns
/// this email.
pub async fn email_taken(
    db: &SqlitePool,
    email: &str,
    exclude_id: Option<i64>,
) -> anyhow::Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM users WHERE email = ?1 AND (?2 IS NULL OR id <> ?2)",
    )
    .bind(email)
    .bind(exclude_id)
    .fetch_one(db)
    .await?;
    Ok(count > 0)
}

pub async fn username_taken(
    db: &SqlitePool,
    username: &str,
    exclude_id: Option<i64>,
) -> anyhow::Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM users WHERE username = ?1 AND (?2 IS NULL OR id <> ?2)",
    )
    .bind(username)
    .bind(exclude_id)
    .fetch_one(db)
    .await?;
    Ok(count > 0)
}

pub async fn update_profile(
    db: &SqlitePool,
    id: i64,
    profile: &ProfileUpdate,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = ?2, email = ?3, username = ?4, phone = ?5, height = ?6, weight = ?7,
            diabetes_type = ?8, emergency_contact_name = ?9, emergency_contact_phone = ?10,
            emergency_contact_relation = ?11
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(&profile.username)
    .bind(&profile.phone)
    .bind(profile.height)
    .bind(profile.weight)
    .bind(profile.diabetes_type.map(|v| v.as_str()))
    .bind(&profile.emergency_contact_name)
    .bind(&profile.emergency_contact_phone)
    .bind(profile.emergency_contact_relation.map(|v| v.as_str()))
    .execute(db)
    .await
    .context("update user profile")?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_password(db: &SqlitePool, id: i64, password_hash: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await
        .context("update user password")?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_active(db: &SqlitePool, id: i64, active: bool) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE users SET active = ?2 WHERE id = ?1")
        .bind(id)
        .bind(if active { 1_i64 } else { 0 })
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Hard delete; the schema cascades to measurements, activities and alerts.
pub async fn delete(db: &SqlitePool, id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_all(db: &SqlitePool) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY name COLLATE NOCASE"
    ))
    .fetch_all(db)
    .await?;
    rows.into_iter().map(User::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn create_and_lookup() {
        let db = testutil::pool().await;
        let user = create(&db, &testutil::profile("joao"), "hash").await.unwrap();
        assert!(user.active);

        let by_username = find_by_username(&db, "joao").await.unwrap().unwrap();
        assert_eq!(by_username.id, user.id);
        let by_email = find_by_email(&db, "joao@email.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(find_by_username(&db, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn uniqueness_checks_can_exclude_self() {
        let db = testutil::pool().await;
        let user = create(&db, &testutil::profile("joao"), "hash").await.unwrap();

        assert!(email_taken(&db, "joao@email.com", None).await.unwrap());
        assert!(!email_taken(&db, "joao@email.com", Some(user.id)).await.unwrap());
        assert!(username_taken(&db, "joao", None).await.unwrap());
        assert!(!username_taken(&db, "joao", Some(user.id)).await.unwrap());
        assert!(!email_taken(&db, "outro@email.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_by_the_store() {
        let db = testutil::pool().await;
        create(&db, &testutil::profile("joao"), "hash").await.unwrap();
        let mut dup = testutil::profile("outro");
        dup.email = "joao@email.com".into();
        assert!(create(&db, &dup, "hash").await.is_err());
    }

    #[tokio::test]
    async fn set_active_and_delete() {
        let db = testutil::pool().await;
        let user = create(&db, &testutil::profile("joao"), "hash").await.unwrap();

        assert!(set_active(&db, user.id, false).await.unwrap());
        let reloaded = find_by_id(&db, user.id).await.unwrap().unwrap();
        assert!(!reloaded.active);

        assert!(delete(&db, user.id).await.unwrap());
        assert!(find_by_id(&db, user.id).await.unwrap().is_none());
        // unknown ids report false, they are not errors
        assert!(!set_active(&db, user.id, true).await.unwrap());
        assert!(!delete(&db, user.id).await.unwrap());
    }
}
