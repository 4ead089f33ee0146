mod app;
mod oauth;

pub use app::{ApiErrorBody, ApiErrorObject, ToolkitError};
pub use oauth::OauthError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
