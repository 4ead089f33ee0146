use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::db::models::{DbMessage, NewMessage};
use crate::error::ToolkitError;

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, chat_id, role, parts, attachments, model_id, created_at";

/// Messages of a chat, oldest first.
pub async fn list(pool: &SqlitePool, chat_id: &str) -> Result<Vec<DbMessage>, ToolkitError> {
    let rows = sqlx::query_as::<_, DbMessage>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn create(pool: &SqlitePool, msg: NewMessage) -> Result<DbMessage, ToolkitError> {
    let row = sqlx::query_as::<_, DbMessage>(&format!(
        r#"
        INSERT INTO messages (id, chat_id, role, parts, attachments, model_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(msg.chat_id)
    .bind(msg.role.as_str())
    .bind(Json(msg.parts))
    .bind(Json(msg.attachments))
    .bind(msg.model_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}
