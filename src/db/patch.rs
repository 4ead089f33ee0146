use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use toolkit_schema::rpc::chats::Visibility;

use crate::error::ToolkitError;

/// Abstraction for applying a patch payload/envelope to the database.
#[async_trait]
pub trait DbPatchable {
    async fn apply_patch(&self, pool: &SqlitePool) -> Result<(), ToolkitError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    /// `None` => do not change; `Some(v)` => update
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Chat fields writable by the owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatPatch {
    pub title: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkbenchPatch {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub toolkit_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    pub access_token: Option<String>,
    /// `None` => keep the stored refresh token (providers may not rotate it).
    pub refresh_token: Option<String>,
    /// Always written; `None` clears the expiry (token without a lifetime).
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// Patch envelope routed through the DB actor. Owner-scoped entities carry
/// the acting user so rows owned by someone else are never touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityPatch {
    User {
        id: String,
        patch: UserPatch,
    },
    Chat {
        id: String,
        user_id: String,
        patch: ChatPatch,
    },
    Workbench {
        id: String,
        user_id: String,
        patch: WorkbenchPatch,
    },
    Account {
        id: String,
        patch: AccountPatch,
    },
}
