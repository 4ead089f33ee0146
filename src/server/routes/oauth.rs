//! Legacy account connection: this server runs the provider's OAuth flow and
//! stores the tokens locally.

use crate::accounts::LegacyProvider;
use crate::error::{OauthError, ToolkitError};
use crate::server::guards::auth::AuthedUser;
use crate::server::router::AppState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::PkceCodeVerifier;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{error, info};

const CSRF_COOKIE: &str = "toolkit_oauth_csrf_token";
const PKCE_COOKIE: &str = "toolkit_oauth_pkce_verifier";

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: String,
    pub state: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/oauth/{provider}/connect", get(oauth_connect))
        .route("/api/oauth/{provider}/callback", get(oauth_callback))
}

/// GET /api/oauth/{provider}/connect
///
/// Starts the authorization-code + PKCE flow and redirects the browser to the provider.
async fn oauth_connect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    user: AuthedUser,
    jar: PrivateCookieJar,
) -> Result<Response, ToolkitError> {
    let provider: LegacyProvider = provider.parse()?;
    let start = state.legacy.authorize(provider)?;
    let secure = !state.insecure_cookie();

    let jar = jar
        .add(build_cookie(CSRF_COOKIE, start.csrf_token.secret().to_string(), secure))
        .add(build_cookie(PKCE_COOKIE, start.pkce_verifier.secret().to_string(), secure));

    info!(user_id = %user.id, provider = %provider, "dispatching legacy OAuth redirect");
    Ok((jar, Redirect::temporary(start.url.as_str())).into_response())
}

/// GET /api/oauth/{provider}/callback
async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<AuthCallbackQuery>,
    user: AuthedUser,
    jar: PrivateCookieJar,
) -> Response {
    let (jar, session_data) = take_oauth_cookies(jar);

    match process_callback(&state, &provider, &user, &query, session_data).await {
        Ok(account_id) => {
            info!(user_id = %user.id, provider, account_id, "legacy OAuth callback accepted");
            (jar, Json(json!({ "success": true, "accountId": account_id }))).into_response()
        }
        Err(err) => {
            error!(provider, "legacy OAuth failure: {:?}", err);
            (jar, err.into_response()).into_response()
        }
    }
}

async fn process_callback(
    state: &AppState,
    provider: &str,
    user: &AuthedUser,
    query: &AuthCallbackQuery,
    session_data: Option<(String, String)>,
) -> Result<String, ToolkitError> {
    let (pkce_verifier, csrf_token) = session_data
        .ok_or_else(|| OauthError::flow("OAUTH_SESSION_MISSING", "Missing OAuth session cookies"))?;

    if !bool::from(query.state.as_bytes().ct_eq(csrf_token.as_bytes())) {
        return Err(OauthError::flow("CSRF_MISMATCH", "CSRF token mismatch").into());
    }

    let provider: LegacyProvider = provider.parse()?;
    let account = state
        .legacy
        .complete(
            &state.db,
            provider,
            &user.id,
            &query.code,
            PkceCodeVerifier::new(pkce_verifier),
        )
        .await?;
    Ok(account.id)
}

fn take_oauth_cookies(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<(String, String)>) {
    let csrf = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let pkce = jar.get(PKCE_COOKIE).map(|c| c.value().to_string());

    let jar = jar
        .remove(Cookie::build(CSRF_COOKIE).path("/"))
        .remove(Cookie::build(PKCE_COOKIE).path("/"));

    match (pkce, csrf) {
        (Some(p), Some(c)) => (jar, Some((p, c))),
        _ => (jar, None),
    }
}

fn build_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}
