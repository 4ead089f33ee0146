use serde_json::Value;
use toolkit_schema::rpc::chats::{
    BranchChatInput, CreateChatInput, GetChatsInput, UpdateChatTitleInput,
    UpdateChatVisibilityInput,
};

use super::{check_page, input, input_or_default, output, unknown_procedure};
use crate::db::{BranchRequest, ChatFilter, ChatPatch, DbChat, EntityPatch, NewChat};
use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;

pub(super) async fn call(
    state: &AppState,
    user: &AuthedUser,
    name: &str,
    raw: Value,
) -> Result<Value, ToolkitError> {
    match name {
        "getChats" => {
            let req: GetChatsInput = input_or_default(raw)?;
            check_page(&req.page)?;
            let filter = ChatFilter {
                user_id: user.id.clone(),
                workbench_id: req.workbench_id,
            };
            output(state.db.list_chats(filter, req.page).await?)
        }
        "getChat" => {
            let id: String = input(raw)?;
            let chat = state
                .db
                .get_chat_with_workbench(&id)
                .await?
                .filter(|c| c.chat.is_visible_to(&user.id));
            output(chat)
        }
        "createChat" => {
            let req: CreateChatInput = input(raw)?;
            if let Some(workbench_id) = req.workbench_id.as_deref() {
                state
                    .db
                    .get_workbench(workbench_id, &user.id)
                    .await?
                    .ok_or_else(|| ToolkitError::not_found("Workbench not found."))?;
            }
            let chat = state
                .db
                .create_chat(NewChat {
                    id: req.id,
                    user_id: user.id.clone(),
                    title: req.title,
                    visibility: req.visibility,
                    workbench_id: req.workbench_id,
                })
                .await?;
            output(chat)
        }
        "updateChatVisibility" => {
            let req: UpdateChatVisibilityInput = input(raw)?;
            let patch = ChatPatch {
                visibility: Some(req.visibility),
                ..Default::default()
            };
            output(update_chat(state, user, req.id, patch).await?)
        }
        "updateChatTitle" => {
            let req: UpdateChatTitleInput = input(raw)?;
            let patch = ChatPatch {
                title: Some(req.title),
                ..Default::default()
            };
            output(update_chat(state, user, req.id, patch).await?)
        }
        "deleteChat" => {
            let id: String = input(raw)?;
            let chat = state
                .db
                .get_chat(&id)
                .await?
                .ok_or_else(|| ToolkitError::not_found("Chat not found."))?;
            if chat.user_id != user.id {
                return Err(ToolkitError::Forbidden(
                    "You do not have permission to delete this chat.".to_string(),
                ));
            }
            let deleted = state
                .db
                .delete_chat(&id, &user.id)
                .await?
                .ok_or_else(|| ToolkitError::not_found("Chat not found."))?;
            output(deleted)
        }
        "branchChat" => {
            let req: BranchChatInput = input(raw)?;
            let chat = state
                .db
                .branch_chat(BranchRequest {
                    source_chat_id: req.original_chat_id,
                    message_id: req.message_id,
                    user_id: user.id.clone(),
                })
                .await?;
            output(chat)
        }
        other => Err(unknown_procedure(&format!("chats.{other}"))),
    }
}

async fn update_chat(
    state: &AppState,
    user: &AuthedUser,
    id: String,
    patch: ChatPatch,
) -> Result<DbChat, ToolkitError> {
    state
        .db
        .patch(EntityPatch::Chat {
            id: id.clone(),
            user_id: user.id.clone(),
            patch,
        })
        .await?;
    state
        .db
        .get_chat(&id)
        .await?
        .ok_or_else(|| ToolkitError::not_found("Chat not found or access denied."))
}
