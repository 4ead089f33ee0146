use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::ToolkitError;
use crate::upstream::{endpoint, ensure_success, read_json, send_with_retry};

/// How a vendor API expects the credential.
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Token <key>`
    Token(String),
    /// Custom header carrying the key verbatim.
    Header(&'static str, String),
}

/// Thin JSON client over one vendor base URL.
#[derive(Clone)]
pub struct ApiClient {
    service: &'static str,
    http: reqwest::Client,
    base: Url,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(service: &'static str, http: reqwest::Client, base: Url, auth: ApiAuth) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let (name, value) = match auth {
            ApiAuth::Bearer(token) => (AUTHORIZATION, format!("Bearer {token}")),
            ApiAuth::Token(key) => (AUTHORIZATION, format!("Token {key}")),
            ApiAuth::Header(name, key) => (HeaderName::from_static(name), key),
        };
        // Credentials with control characters cannot be sent; the vendor then answers 401.
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
        Self {
            service,
            http,
            base,
            headers,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Result<Self, ToolkitError> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| ToolkitError::Internal(format!("invalid {name} header value")))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ToolkitError> {
        let mut url = endpoint(&self.base, segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    pub async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Value, ToolkitError> {
        let url = self.url(segments, query)?;
        let resp = send_with_retry(self.service, || {
            self.http.get(url.clone()).headers(self.headers.clone())
        })
        .await?;
        read_json(self.service, resp).await
    }

    /// GET returning the body as text (file downloads and exports). At most
    /// `max_bytes` are read; the rest of the body is never pulled.
    pub async fn get_text(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        max_bytes: usize,
    ) -> Result<String, ToolkitError> {
        let url = self.url(segments, query)?;
        let resp = send_with_retry(self.service, || {
            self.http.get(url.clone()).headers(self.headers.clone())
        })
        .await?;
        let mut resp = ensure_success(self.service, resp).await?;

        let mut buf = Vec::with_capacity(max_bytes.min(64 * 1024));
        while buf.len() < max_bytes {
            let Some(chunk) = resp.chunk().await? else {
                break;
            };
            let take = chunk.len().min(max_bytes - buf.len());
            buf.extend_from_slice(&chunk[..take]);
        }
        Ok(decode_prefix(buf))
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Value, ToolkitError> {
        let url = self.url(segments, &[])?;
        let resp = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;
        read_json(self.service, resp).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Value, ToolkitError> {
        let url = self.url(segments, &[])?;
        let resp = self
            .http
            .patch(url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?;
        read_json(self.service, resp).await
    }
}

/// UTF-8 decode of a body prefix; a code point cut by the byte cap is dropped.
fn decode_prefix(mut buf: Vec<u8>) -> String {
    let incomplete_tail = match std::str::from_utf8(&buf) {
        Err(e) if e.error_len().is_none() => Some(e.valid_up_to()),
        _ => None,
    };
    if let Some(valid) = incomplete_tail {
        buf.truncate(valid);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Query pair helper skipping absent values.
pub(crate) fn push_opt<T: ToString>(query: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<T>) {
    if let Some(v) = value {
        query.push((key, v.to_string()));
    }
}
