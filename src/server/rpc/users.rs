use serde_json::Value;
use toolkit_schema::rpc::users::{CurrentUser, UpdateUserInput};
use tracing::info;

use super::{input_or_default, output, unknown_procedure};
use crate::db::{EntityPatch, UserPatch};
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
        "getCurrentUser" => output(CurrentUser::from(user.user.clone())),
        "updateUser" => {
            let req: UpdateUserInput = input_or_default(raw)?;
            if let Some(email) = req.email.as_deref() {
                if !is_valid_email(email) {
                    return Err(ToolkitError::bad_request("Invalid email address"));
                }
            }
            state
                .db
                .patch(EntityPatch::User {
                    id: user.id.clone(),
                    patch: UserPatch {
                        name: req.name,
                        email: req.email,
                        image: req.image,
                    },
                })
                .await?;
            let updated = state
                .db
                .get_user(&user.id)
                .await?
                .ok_or_else(|| ToolkitError::not_found("User not found."))?;
            output(CurrentUser::from(updated))
        }
        "deleteUser" => {
            if !state.db.delete_user(&user.id).await? {
                return Err(ToolkitError::not_found("User not found."));
            }
            info!(user_id = %user.id, "local user deleted");
            output(CurrentUser::from(user.user.clone()))
        }
        other => Err(unknown_procedure(&format!("users.{other}"))),
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.')
        && !domain.contains("..")
}

#[cfg(test)]
mod tests {
    use super::is_valid_email;

    #[test]
    fn email_syntax() {
        for ok in ["a@b.co", "first.last+tag@mail.example.org"] {
            assert!(is_valid_email(ok), "{ok}");
        }
        for bad in ["", "plain", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@b.", "a@.com", "a@b..com"] {
            assert!(!is_valid_email(bad), "{bad}");
        }
    }
}
