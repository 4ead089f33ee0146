use chrono::Utc;
use sqlx::SqlitePool;
use toolkit_schema::{Page, PageInput};
use uuid::Uuid;

use super::into_page;
use crate::db::models::{DbAccount, NewAccount};
use crate::error::ToolkitError;

const ACCOUNT_COLUMNS: &str = "id, user_id, provider, provider_account_id, access_token, refresh_token, expires_at, scope, created_at, updated_at";

pub async fn list(
    pool: &SqlitePool,
    user_id: &str,
    page: &PageInput,
) -> Result<Page<DbAccount>, ToolkitError> {
    let rows = sqlx::query_as::<_, DbAccount>(&format!(
        r#"
        SELECT {ACCOUNT_COLUMNS}
        FROM accounts
        WHERE user_id = ?
          AND (? IS NULL OR (created_at, id) <= (SELECT created_at, id FROM accounts WHERE id = ?))
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#
    ))
    .bind(user_id)
    .bind(page.cursor.as_deref())
    .bind(page.cursor.as_deref())
    .bind(i64::from(page.limit) + 1)
    .fetch_all(pool)
    .await?;
    Ok(into_page(rows, page.limit))
}

/// Most recently updated account of `user_id` for `provider`.
pub async fn get_by_provider(
    pool: &SqlitePool,
    user_id: &str,
    provider: &str,
) -> Result<Option<DbAccount>, ToolkitError> {
    let row = sqlx::query_as::<_, DbAccount>(&format!(
        r#"
        SELECT {ACCOUNT_COLUMNS}
        FROM accounts
        WHERE user_id = ? AND provider = ?
        ORDER BY updated_at DESC
        LIMIT 1
        "#
    ))
    .bind(user_id)
    .bind(provider)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Links a provider account to a user. Reconnecting the same provider
/// account moves it to the latest user and replaces its tokens.
pub async fn upsert(pool: &SqlitePool, acc: NewAccount) -> Result<DbAccount, ToolkitError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, DbAccount>(&format!(
        r#"
        INSERT INTO accounts (
            id, user_id, provider, provider_account_id, access_token, refresh_token, expires_at, scope, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(provider, provider_account_id) DO UPDATE SET
            user_id = excluded.user_id,
            access_token = excluded.access_token,
            refresh_token = COALESCE(excluded.refresh_token, accounts.refresh_token),
            expires_at = excluded.expires_at,
            scope = COALESCE(excluded.scope, accounts.scope),
            updated_at = excluded.updated_at
        RETURNING {ACCOUNT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(acc.user_id)
    .bind(acc.provider)
    .bind(acc.provider_account_id)
    .bind(acc.access_token)
    .bind(acc.refresh_token)
    .bind(acc.expires_at)
    .bind(acc.scope)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns whether an owned row was removed.
pub async fn delete(pool: &SqlitePool, id: &str, user_id: &str) -> Result<bool, ToolkitError> {
    let res = sqlx::query("DELETE FROM accounts WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
