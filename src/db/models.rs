use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use toolkit_schema::rpc::chats::Visibility;
use toolkit_schema::rpc::messages::MessageRole;
use toolkit_schema::rpc::users::CurrentUser;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbUser> for CurrentUser {
    fn from(u: DbUser) -> Self {
        CurrentUser {
            id: u.id,
            name: u.name,
            email: u.email,
            image: u.image,
            email_verified: u.email_verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbWorkbench {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub system_prompt: String,
    pub toolkit_ids: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbChat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub visibility: Visibility,
    pub workbench_id: Option<String>,
    pub parent_chat_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbChat {
    /// Owner, or anyone when the chat is public.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.visibility == Visibility::Public
    }
}

/// Chat row with its workbench embedded (`getChat`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithWorkbench {
    #[serde(flatten)]
    pub chat: DbChat,
    pub workbench: Option<DbWorkbench>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DbMessage {
    pub id: String,
    pub chat_id: String,
    #[sqlx(try_from = "String")]
    pub role: MessageRole,
    pub parts: Json<Value>,
    pub attachments: Json<Vec<Value>>,
    pub model_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Legacy OAuth account row. Tokens never leave the server.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbAccount {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWorkbench {
    pub user_id: String,
    pub name: String,
    pub system_prompt: String,
    pub toolkit_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewChat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub workbench_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: String,
    pub role: MessageRole,
    pub parts: Value,
    pub attachments: Vec<Value>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

/// `getChats` filter over the requester's chats.
#[derive(Debug, Clone)]
pub struct ChatFilter {
    pub user_id: String,
    /// `None` => any; `Some(None)` => without workbench; `Some(Some(id))` => that workbench.
    pub workbench_id: Option<Option<String>>,
}

/// Branch `source_chat_id` at `message_id` into a new chat owned by `user_id`.
#[derive(Debug, Clone)]
pub struct BranchRequest {
    pub source_chat_id: String,
    pub message_id: String,
    pub user_id: String,
}
