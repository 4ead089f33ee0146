use crate::config::OauthProviderConfig;
use crate::error::{OauthError, ToolkitError};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Extra (non-standard) OAuth token response fields.
///
/// Providers attach identifiers to the token response (Notion's `owner`, Google's
/// `id_token`); everything is kept via `flatten`. Debug output is redacted.
#[derive(Clone, Deserialize, Serialize)]
pub(crate) struct CustomTokenFields {
    pub id_token: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ExtraTokenFields for CustomTokenFields {}

impl std::fmt::Debug for CustomTokenFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_token = self.id_token.as_ref().map(|_| "<redacted>");
        let mut keys: Vec<&String> = self.extra.keys().collect();
        keys.sort();

        f.debug_struct("CustomTokenFields")
            .field("id_token", &id_token)
            .field("extra_keys", &keys)
            .finish()
    }
}

/// Standard OAuth2 token endpoint response extended with [`CustomTokenFields`].
pub(crate) type OauthTokenResponse = StandardTokenResponse<CustomTokenFields, BasicTokenType>;

/// A standard OAuth2 client configured to return [`OauthTokenResponse`].
pub(crate) type StandardOauth2Client<
    HasAuthUrl = oauth2::EndpointSet,
    HasDeviceAuthUrl = oauth2::EndpointNotSet,
    HasIntrospectionUrl = oauth2::EndpointNotSet,
    HasRevocationUrl = oauth2::EndpointNotSet,
    HasTokenUrl = oauth2::EndpointSet,
> = OAuth2Client<
    BasicErrorResponse,
    OauthTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    HasDeviceAuthUrl,
    HasIntrospectionUrl,
    HasRevocationUrl,
    HasTokenUrl,
>;

/// Build an OAuth2 client for `authorization_code` + `refresh_token` flows
/// against one configured provider.
pub(crate) fn build_oauth2_client(
    cfg: &OauthProviderConfig,
    redirect_url: RedirectUrl,
) -> Result<StandardOauth2Client, ToolkitError> {
    let mut client = OAuth2Client::<
        BasicErrorResponse,
        OauthTokenResponse,
        BasicTokenIntrospectionResponse,
        StandardRevocableToken,
        BasicRevocationErrorResponse,
    >::new(ClientId::new(cfg.client_id.clone()));

    if !cfg.client_secret.is_empty() {
        client = client.set_client_secret(ClientSecret::new(cfg.client_secret.clone()));
    }

    let client = client
        .set_auth_uri(AuthUrl::new(cfg.auth_url.to_string())?)
        .set_token_uri(TokenUrl::new(cfg.token_url.to_string())?)
        .set_redirect_uri(redirect_url);

    Ok(client)
}

/// Authorization URL with PKCE challenge and the provider's configured scopes.
pub(crate) fn build_authorize_url(
    client: &StandardOauth2Client,
    cfg: &OauthProviderConfig,
    pkce_challenge: PkceCodeChallenge,
) -> (url::Url, CsrfToken) {
    let mut req = client
        .authorize_url(CsrfToken::new_random)
        .set_pkce_challenge(pkce_challenge)
        // Google only issues refresh tokens for offline access.
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent");

    for scope in &cfg.scopes {
        req = req.add_scope(Scope::new(scope.clone()));
    }

    req.url()
}

pub(crate) async fn exchange_authorization_code(
    client: &StandardOauth2Client,
    code: AuthorizationCode,
    verifier: PkceCodeVerifier,
    http_client: &reqwest::Client,
) -> Result<OauthTokenResponse, OauthError> {
    let token_result: OauthTokenResponse = client
        .exchange_code(code)
        .set_pkce_verifier(verifier)
        .request_async(http_client)
        .await?;
    Ok(token_result)
}

pub(crate) async fn refresh_access_token(
    client: &StandardOauth2Client,
    refresh_token: &str,
    http_client: &reqwest::Client,
) -> Result<OauthTokenResponse, OauthError> {
    let token_result: OauthTokenResponse = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(http_client)
        .await?;
    Ok(token_result)
}
