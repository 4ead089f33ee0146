use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{DbUser, NewUser};
use crate::error::ToolkitError;

const USER_COLUMNS: &str = "id, name, email, image, email_verified, created_at, updated_at";

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<DbUser>, ToolkitError> {
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Plain insert; a duplicate id or email surfaces as a unique violation.
pub async fn insert(pool: &SqlitePool, user: NewUser) -> Result<DbUser, ToolkitError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, DbUser>(&format!(
        r#"
        INSERT INTO users (id, name, email, image, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(user.name)
    .bind(user.email)
    .bind(user.image)
    .bind(user.email_verified)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Insert or refresh a user from the identity provider. An existing
/// verification timestamp is kept while the email stays verified.
pub async fn upsert(pool: &SqlitePool, user: NewUser) -> Result<DbUser, ToolkitError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, DbUser>(&format!(
        r#"
        INSERT INTO users (id, name, email, image, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            image = excluded.image,
            email_verified = CASE
                WHEN excluded.email_verified IS NULL THEN NULL
                ELSE COALESCE(users.email_verified, excluded.email_verified)
            END,
            updated_at = excluded.updated_at
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(user.name)
    .bind(user.email)
    .bind(user.image)
    .bind(user.email_verified)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns whether a row was removed.
pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, ToolkitError> {
    let res = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
