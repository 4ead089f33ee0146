use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use toolkit_schema::{Page, PageInput};
use uuid::Uuid;

use super::into_page;
use crate::db::models::{DbWorkbench, NewWorkbench};
use crate::error::ToolkitError;

const WORKBENCH_COLUMNS: &str =
    "id, user_id, name, system_prompt, toolkit_ids, created_at, updated_at";

pub async fn list(
    pool: &SqlitePool,
    user_id: &str,
    page: &PageInput,
) -> Result<Page<DbWorkbench>, ToolkitError> {
    let rows = sqlx::query_as::<_, DbWorkbench>(&format!(
        r#"
        SELECT {WORKBENCH_COLUMNS}
        FROM workbenches
        WHERE user_id = ?
          AND (? IS NULL OR (created_at, id) <= (SELECT created_at, id FROM workbenches WHERE id = ?))
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

/// Owner-scoped lookup.
pub async fn get(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<DbWorkbench>, ToolkitError> {
    let row = sqlx::query_as::<_, DbWorkbench>(&format!(
        "SELECT {WORKBENCH_COLUMNS} FROM workbenches WHERE id = ? AND user_id = ?"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_any(pool: &SqlitePool, id: &str) -> Result<Option<DbWorkbench>, ToolkitError> {
    let row = sqlx::query_as::<_, DbWorkbench>(&format!(
        "SELECT {WORKBENCH_COLUMNS} FROM workbenches WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create(pool: &SqlitePool, wb: NewWorkbench) -> Result<DbWorkbench, ToolkitError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, DbWorkbench>(&format!(
        r#"
        INSERT INTO workbenches (id, user_id, name, system_prompt, toolkit_ids, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {WORKBENCH_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(wb.user_id)
    .bind(wb.name)
    .bind(wb.system_prompt)
    .bind(Json(wb.toolkit_ids))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Deletes an owned workbench; its chats are detached by the foreign key.
pub async fn delete(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<DbWorkbench>, ToolkitError> {
    let row = sqlx::query_as::<_, DbWorkbench>(&format!(
        "DELETE FROM workbenches WHERE id = ? AND user_id = ? RETURNING {WORKBENCH_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
