use super::app::ToolkitError;
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde_json::Value;
use thiserror::Error as ThisError;

/// Longest token-endpoint body excerpt kept in a parse error.
const BODY_EXCERPT_CHARS: usize = 100;

/// Failures of the legacy account-linking flow and its token endpoint calls.
#[derive(Debug, ThisError)]
pub enum OauthError {
    /// Rejected connect/callback request; `code` is surfaced to the caller.
    #[error("OAuth flow error: {message}")]
    Flow {
        code: String,
        message: String,
        details: Option<Value>,
    },

    #[error("token endpoint unreachable: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with an RFC 6749 error (`invalid_grant`, ...).
    #[error("token endpoint rejected the grant: {error}")]
    ServerResponse { error: String },

    #[error("token endpoint sent an unreadable response: {message}. Body: {body}")]
    Parse { message: String, body: String },

    #[error("token exchange failed: {message}")]
    Other { message: String },
}

impl OauthError {
    pub fn flow(code: &str, message: impl Into<String>) -> Self {
        OauthError::Flow {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

type TokenEndpointError = RequestTokenError<
    HttpClientError<ReqwestClientError>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

impl From<TokenEndpointError> for OauthError {
    fn from(e: TokenEndpointError) -> Self {
        match e {
            RequestTokenError::ServerResponse(resp) => {
                let error = match resp.error_description() {
                    Some(desc) => format!("{} ({desc})", resp.error()),
                    None => resp.error().to_string(),
                };
                OauthError::ServerResponse { error }
            }
            RequestTokenError::Request(HttpClientError::Reqwest(err)) => OauthError::Request(*err),
            RequestTokenError::Request(other) => OauthError::Other {
                message: other.to_string(),
            },
            RequestTokenError::Parse(err, body) => OauthError::Parse {
                message: err.to_string(),
                body: excerpt(&body),
            },
            RequestTokenError::Other(message) => OauthError::Other { message },
        }
    }
}

impl From<TokenEndpointError> for ToolkitError {
    fn from(e: TokenEndpointError) -> Self {
        OauthError::from(e).into()
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...<truncated>", &text[..idx]),
        None => text.into_owned(),
    }
}
