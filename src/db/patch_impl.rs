//! EntityPatch -> DbPatchable implementation.
//!
//! This sits in the `db` module because it contains SQL/table knowledge.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use tracing::debug;

use crate::db::patch::{AccountPatch, DbPatchable, EntityPatch};
use crate::error::ToolkitError;

#[async_trait]
impl DbPatchable for EntityPatch {
    async fn apply_patch(&self, pool: &SqlitePool) -> Result<(), ToolkitError> {
        let updated_at = Utc::now();
        match self {
            EntityPatch::User { id, patch } => {
                let res = sqlx::query(
                    r#"
                    UPDATE users
                    SET
                        name = COALESCE(?, name),
                        email = COALESCE(?, email),
                        image = COALESCE(?, image),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(patch.name.as_deref())
                .bind(patch.email.as_deref())
                .bind(patch.image.as_deref())
                .bind(updated_at)
                .bind(id)
                .execute(pool)
                .await
                .map_err(|e| {
                    let err = ToolkitError::from(e);
                    if err.is_unique_violation() {
                        ToolkitError::Conflict("Email is already in use.".to_string())
                    } else {
                        err
                    }
                })?;

                let affected = res.rows_affected();
                debug!(
                    entity = "user",
                    id = %id,
                    affected,
                    name_set = patch.name.is_some(),
                    email_set = patch.email.is_some(),
                    image_set = patch.image.is_some(),
                    "db patch applied"
                );
                if affected == 0 {
                    return Err(ToolkitError::not_found("User not found."));
                }
                Ok(())
            }

            EntityPatch::Chat { id, user_id, patch } => {
                let res = sqlx::query(
                    r#"
                    UPDATE chats
                    SET
                        title = COALESCE(?, title),
                        visibility = COALESCE(?, visibility),
                        updated_at = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(patch.title.as_deref())
                .bind(patch.visibility.map(|v| v.as_str()))
                .bind(updated_at)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await?;

                let affected = res.rows_affected();
                debug!(
                    entity = "chat",
                    id = %id,
                    affected,
                    title_set = patch.title.is_some(),
                    visibility_set = patch.visibility.is_some(),
                    "db patch applied"
                );
                if affected == 0 {
                    return Err(ToolkitError::not_found("Chat not found or access denied."));
                }
                Ok(())
            }

            EntityPatch::Workbench { id, user_id, patch } => {
                let res = sqlx::query(
                    r#"
                    UPDATE workbenches
                    SET
                        name = COALESCE(?, name),
                        system_prompt = COALESCE(?, system_prompt),
                        toolkit_ids = COALESCE(?, toolkit_ids),
                        updated_at = ?
                    WHERE id = ? AND user_id = ?
                    "#,
                )
                .bind(patch.name.as_deref())
                .bind(patch.system_prompt.as_deref())
                .bind(patch.toolkit_ids.clone().map(Json))
                .bind(updated_at)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await?;

                let affected = res.rows_affected();
                debug!(entity = "workbench", id = %id, affected, "db patch applied");
                if affected == 0 {
                    return Err(ToolkitError::not_found("Workbench not found."));
                }
                Ok(())
            }

            EntityPatch::Account { id, patch } => {
                let AccountPatch {
                    access_token,
                    refresh_token,
                    expires_at,
                    scope,
                } = patch.clone();
                let access_token_set = access_token.is_some();
                let refresh_token_set = refresh_token.is_some();

                let res = sqlx::query(
                    r#"
                    UPDATE accounts
                    SET
                        access_token = COALESCE(?, access_token),
                        refresh_token = COALESCE(?, refresh_token),
                        expires_at = ?,
                        scope = COALESCE(?, scope),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(access_token)
                .bind(refresh_token)
                .bind(expires_at)
                .bind(scope)
                .bind(updated_at)
                .bind(id)
                .execute(pool)
                .await?;

                let affected = res.rows_affected();
                debug!(
                    entity = "account",
                    id = %id,
                    affected,
                    access_token_set,
                    refresh_token_set,
                    "db patch applied"
                );
                if affected == 0 {
                    return Err(ToolkitError::not_found("Account not found."));
                }
                Ok(())
            }
        }
    }
}
