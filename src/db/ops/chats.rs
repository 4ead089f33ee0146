use chrono::Utc;
use sqlx::SqlitePool;
use toolkit_schema::{Page, PageInput};
use uuid::Uuid;

use super::into_page;
use super::messages::MESSAGE_COLUMNS;
use crate::db::models::{BranchRequest, ChatFilter, ChatWithWorkbench, DbChat, DbMessage, NewChat};
use crate::error::ToolkitError;

const CHAT_COLUMNS: &str =
    "id, user_id, title, visibility, workbench_id, parent_chat_id, created_at, updated_at";

pub async fn list(
    pool: &SqlitePool,
    filter: &ChatFilter,
    page: &PageInput,
) -> Result<Page<DbChat>, ToolkitError> {
    // `IS` compares NULL as a value, so one placeholder covers both a
    // concrete workbench and "no workbench".
    let (filter_workbench, workbench_id) = match &filter.workbench_id {
        None => (false, None),
        Some(id) => (true, id.as_deref()),
    };

    let rows = sqlx::query_as::<_, DbChat>(&format!(
        r#"
        SELECT {CHAT_COLUMNS}
        FROM chats
        WHERE user_id = ?
          AND (? = 0 OR workbench_id IS ?)
          AND (? IS NULL OR (created_at, id) <= (SELECT created_at, id FROM chats WHERE id = ?))
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#
    ))
    .bind(&filter.user_id)
    .bind(filter_workbench)
    .bind(workbench_id)
    .bind(page.cursor.as_deref())
    .bind(page.cursor.as_deref())
    .bind(i64::from(page.limit) + 1)
    .fetch_all(pool)
    .await?;
    Ok(into_page(rows, page.limit))
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<DbChat>, ToolkitError> {
    let row = sqlx::query_as::<_, DbChat>(&format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn get_with_workbench(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<ChatWithWorkbench>, ToolkitError> {
    let Some(chat) = get(pool, id).await? else {
        return Ok(None);
    };
    let workbench = match chat.workbench_id.as_deref() {
        Some(wb_id) => super::workbenches::get_any(pool, wb_id).await?,
        None => None,
    };
    Ok(Some(ChatWithWorkbench { chat, workbench }))
}

pub async fn create(pool: &SqlitePool, chat: NewChat) -> Result<DbChat, ToolkitError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, DbChat>(&format!(
        r#"
        INSERT INTO chats (id, user_id, title, visibility, workbench_id, parent_chat_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
        RETURNING {CHAT_COLUMNS}
        "#
    ))
    .bind(chat.id)
    .bind(chat.user_id)
    .bind(chat.title)
    .bind(chat.visibility.as_str())
    .bind(chat.workbench_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        let err = ToolkitError::from(e);
        if err.is_unique_violation() {
            ToolkitError::Conflict("A chat with this id already exists.".to_string())
        } else {
            err
        }
    })?;
    Ok(row)
}

/// Deletes an owned chat; messages cascade.
pub async fn delete(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<DbChat>, ToolkitError> {
    let row = sqlx::query_as::<_, DbChat>(&format!(
        "DELETE FROM chats WHERE id = ? AND user_id = ? RETURNING {CHAT_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Copies the source chat's history up to and including the cut message into
/// a new chat, in one transaction. Copies keep their original timestamps.
pub async fn branch(pool: &SqlitePool, req: BranchRequest) -> Result<DbChat, ToolkitError> {
    let mut tx = pool.begin().await?;

    let source = sqlx::query_as::<_, DbChat>(&format!(
        "SELECT {CHAT_COLUMNS} FROM chats WHERE id = ? AND user_id = ?"
    ))
    .bind(&req.source_chat_id)
    .bind(&req.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ToolkitError::not_found("Chat not found or access denied"))?;

    let history = sqlx::query_as::<_, DbMessage>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(&source.id)
    .fetch_all(&mut *tx)
    .await?;

    let Some(cut) = history.iter().position(|m| m.id == req.message_id) else {
        return Err(ToolkitError::not_found("Message not found in chat"));
    };

    let now = Utc::now();
    let branched = sqlx::query_as::<_, DbChat>(&format!(
        r#"
        INSERT INTO chats (id, user_id, title, visibility, workbench_id, parent_chat_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, NULL, ?, ?, ?)
        RETURNING {CHAT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(&req.user_id)
    .bind(&source.title)
    .bind(source.visibility.as_str())
    .bind(&source.id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for msg in &history[..=cut] {
        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, role, parts, attachments, model_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&branched.id)
        .bind(msg.role.as_str())
        .bind(&msg.parts)
        .bind(&msg.attachments)
        .bind(msg.model_id.as_deref())
        .bind(msg.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(branched)
}
