use common::{Envelope, OptionUpdate, QuotaSummary, SyncStatus, UsagePage};
use myerrors::QueryError;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const OPTION_PATH: &str = "/api/option/";
pub const SYNC_STATUS_PATH: &str = "/api/github/sync/status";
pub const SYNC_TRIGGER_PATH: &str = "/api/github/sync";

pub type OptionMap = HashMap<String, String>;

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

pub fn new_client(
    base_url: &str,
    access_token: Option<String>,
    timeout: Duration,
) -> Result<Client, QueryError> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| QueryError::transport(format!("failed to build HTTP client: {e}")))?;
    Ok(Client {
        http,
        base_url: base_url.trim_end_matches('/').to_string(),
        access_token: access_token.filter(|t| !t.is_empty()),
    })
}

impl Client {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, QueryError> {
        let request = match &self.access_token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| QueryError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::transport(e.to_string()))?;
        decode_envelope(status, &body)
    }
}

pub fn token_quota_path(key: &str) -> String {
    format!("/api/query/token?key={}", urlencoding::encode(key))
}

pub fn token_history_path(key: &str, page: u32, page_size: u32) -> String {
    format!(
        "/api/query/token/history?key={}&page={}&page_size={}",
        urlencoding::encode(key),
        page,
        page_size
    )
}

/// Non-2xx answers that still carry an envelope are passed through so the
/// caller sees the server's own `success = false` message.
pub fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<Envelope<T>, QueryError> {
    match serde_json::from_slice::<Envelope<T>>(body) {
        Ok(envelope) => Ok(envelope),
        Err(e) if (200..300).contains(&status) => {
            Err(QueryError::transport(format!("unreadable response: {e}")))
        }
        Err(_) => Err(QueryError::transport(format!("HTTP {status}"))),
    }
}

#[derive(Deserialize)]
struct OptionEntry {
    key: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionsPayload {
    Map(HashMap<String, serde_json::Value>),
    List(Vec<OptionEntry>),
}

fn option_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<OptionsPayload> for OptionMap {
    fn from(payload: OptionsPayload) -> Self {
        match payload {
            OptionsPayload::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k, option_text(v)))
                .collect(),
            OptionsPayload::List(entries) => entries
                .into_iter()
                .map(|e| (e.key, option_text(e.value)))
                .collect(),
        }
    }
}

pub async fn get_token_quota(client: &Client, key: &str) -> Result<Envelope<QuotaSummary>, QueryError> {
    log::debug!("GET quota summary");
    client
        .send(client.http.get(client.url(&token_quota_path(key))))
        .await
}

pub async fn get_token_history(
    client: &Client,
    key: &str,
    page: u32,
    page_size: u32,
) -> Result<Envelope<UsagePage>, QueryError> {
    log::debug!("GET usage history page {page}");
    client
        .send(
            client
                .http
                .get(client.url(&token_history_path(key, page, page_size))),
        )
        .await
}

/// Options may arrive as an object or as a list of `{key, value}` entries.
pub async fn get_options(client: &Client) -> Result<Envelope<OptionMap>, QueryError> {
    let envelope: Envelope<OptionsPayload> =
        client.send(client.http.get(client.url(OPTION_PATH))).await?;
    Ok(Envelope {
        success: envelope.success,
        message: envelope.message,
        data: envelope.data.map(OptionMap::from),
    })
}

pub async fn put_option(
    client: &Client,
    key: &str,
    value: &str,
) -> Result<Envelope<serde_json::Value>, QueryError> {
    log::debug!("PUT option {key}");
    let body = OptionUpdate {
        key: key.to_string(),
        value: value.to_string(),
    };
    client
        .send(client.http.put(client.url(OPTION_PATH)).json(&body))
        .await
}

pub async fn get_sync_status(client: &Client) -> Result<Envelope<SyncStatus>, QueryError> {
    client
        .send(client.http.get(client.url(SYNC_STATUS_PATH)))
        .await
}

pub async fn trigger_sync(client: &Client) -> Result<Envelope<serde_json::Value>, QueryError> {
    client
        .send(client.http.post(client.url(SYNC_TRIGGER_PATH)))
        .await
}
