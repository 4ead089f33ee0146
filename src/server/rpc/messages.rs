use serde::Deserialize;
use serde_json::Value;
use toolkit_schema::rpc::messages::CreateMessageInput;

use super::{input, output, unknown_procedure};
use crate::db::NewMessage;
use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;

/// `getMessages` accepts the bare chat id or `{ "chatId": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChatRef {
    Id(String),
    Object {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
}

impl ChatRef {
    fn into_id(self) -> String {
        match self {
            ChatRef::Id(id) | ChatRef::Object { chat_id: id } => id,
        }
    }
}

pub(super) async fn call(
    state: &AppState,
    user: &AuthedUser,
    name: &str,
    raw: Value,
) -> Result<Value, ToolkitError> {
    match name {
        "getMessages" => {
            let chat_id = input::<ChatRef>(raw)?.into_id();
            state
                .db
                .get_chat(&chat_id)
                .await?
                .filter(|c| c.is_visible_to(&user.id))
                .ok_or_else(|| ToolkitError::not_found("Chat not found or access denied"))?;
            output(state.db.list_messages(&chat_id).await?)
        }
        "createMessage" => {
            let req: CreateMessageInput = input(raw)?;
            state
                .db
                .get_chat(&req.chat_id)
                .await?
                .filter(|c| c.user_id == user.id)
                .ok_or_else(|| ToolkitError::not_found("Chat not found or access denied"))?;
            let message = state
                .db
                .create_message(NewMessage {
                    chat_id: req.chat_id,
                    role: req.role,
                    parts: req.parts,
                    attachments: req.attachments,
                    model_id: req.model_id,
                })
                .await?;
            output(message)
        }
        other => Err(unknown_procedure(&format!("messages.{other}"))),
    }
}
