use serde_json::Value;
use toolkit_schema::PageInput;
use toolkit_schema::rpc::workbenches::{CreateWorkbenchInput, UpdateWorkbenchInput};

use super::{check_page, input, input_or_default, output, unknown_procedure};
use crate::db::{EntityPatch, NewWorkbench, WorkbenchPatch};
use crate::error::ToolkitError;
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;
use crate::toolkits::ToolkitId;

/// Rejects ids outside the registry; returns them de-duplicated in input order.
fn validate_toolkit_ids(ids: Vec<String>) -> Result<Vec<String>, ToolkitError> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        id.parse::<ToolkitId>()?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

fn validate_name(name: &str) -> Result<(), ToolkitError> {
    if name.trim().is_empty() {
        return Err(ToolkitError::bad_request("Workbench name must not be empty"));
    }
    Ok(())
}

pub(super) async fn call(
    state: &AppState,
    user: &AuthedUser,
    name: &str,
    raw: Value,
) -> Result<Value, ToolkitError> {
    match name {
        "getWorkbenches" => {
            let page: PageInput = input_or_default(raw)?;
            check_page(&page)?;
            output(state.db.list_workbenches(&user.id, page).await?)
        }
        "getWorkbench" => {
            let id: String = input(raw)?;
            output(state.db.get_workbench(&id, &user.id).await?)
        }
        "createWorkbench" => {
            let req: CreateWorkbenchInput = input(raw)?;
            validate_name(&req.name)?;
            let toolkit_ids = validate_toolkit_ids(req.toolkit_ids)?;
            let workbench = state
                .db
                .create_workbench(NewWorkbench {
                    user_id: user.id.clone(),
                    name: req.name,
                    system_prompt: req.system_prompt,
                    toolkit_ids,
                })
                .await?;
            output(workbench)
        }
        "updateWorkbench" => {
            let req: UpdateWorkbenchInput = input(raw)?;
            validate_name(&req.name)?;
            let toolkit_ids = validate_toolkit_ids(req.toolkit_ids)?;
            state
                .db
                .patch(EntityPatch::Workbench {
                    id: req.id.clone(),
                    user_id: user.id.clone(),
                    patch: WorkbenchPatch {
                        name: Some(req.name),
                        system_prompt: Some(req.system_prompt),
                        toolkit_ids: Some(toolkit_ids),
                    },
                })
                .await?;
            let workbench = state
                .db
                .get_workbench(&req.id, &user.id)
                .await?
                .ok_or_else(|| ToolkitError::not_found("Workbench not found."))?;
            output(workbench)
        }
        "deleteWorkbench" => {
            let id: String = input(raw)?;
            let deleted = state
                .db
                .delete_workbench(&id, &user.id)
                .await?
                .ok_or_else(|| ToolkitError::not_found("Workbench not found."))?;
            output(deleted)
        }
        other => Err(unknown_procedure(&format!("workbenches.{other}"))),
    }
}
