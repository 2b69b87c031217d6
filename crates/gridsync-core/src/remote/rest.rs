//! PostgREST-style HTTP remote store.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;
use crate::models::Row;
use crate::util::compact_reason;

/// PostgREST error code for "no rows returned" on single-object requests
const NO_ROWS_CODE: &str = "PGRST116";

/// Remote store backed by a PostgREST-compatible REST API
#[derive(Clone)]
pub struct RestRemoteStore {
    config: RemoteConfig,
    id_field: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RestRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RestRemoteStore")
            .field("config", &self.config)
            .field("id_field", &self.id_field)
            .finish_non_exhaustive()
    }
}

impl RestRemoteStore {
    /// Create a client for the configured endpoint
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| RemoteError::Other(error.to_string()))?;
        Ok(Self {
            config,
            id_field: "id".to_string(),
            client,
        })
    }

    /// Filter rows by this column instead of `id`
    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    fn table_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, collection.trim())
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("Accept", "application/json");
        let builder = match &self.config.api_key {
            Some(api_key) => builder.header("apikey", api_key),
            None => builder,
        };
        match self.config.access_token.as_ref().or(self.config.api_key.as_ref()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn by_id(&self, builder: RequestBuilder, id: &str) -> RequestBuilder {
        builder.query(&[(self.id_field.as_str(), format!("eq.{id}"))])
    }

    /// Rows returned by a `return=representation` request, or the error body
    async fn rows(response: Response) -> RemoteResult<Vec<Row>> {
        let response = check_status(response).await?;
        let text = response.text().await.map_err(map_transport_error)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str::<Vec<Row>>(&text)
            .map_err(|error| RemoteError::Other(format!("invalid response payload: {error}")))
    }
}

#[async_trait::async_trait]
impl RemoteStore for RestRemoteStore {
    async fn insert(&self, collection: &str, payload: &Row) -> RemoteResult<()> {
        let response = self
            .request(self.client.post(self.table_url(collection)))
            .header("Prefer", "return=minimal")
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, payload: &Row) -> RemoteResult<()> {
        let builder = self.request(self.client.patch(self.table_url(collection)));
        let response = self
            .by_id(builder, id)
            .header("Prefer", "return=representation")
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        if Self::rows(response).await?.is_empty() {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let builder = self.request(self.client.delete(self.table_url(collection)));
        let response = self
            .by_id(builder, id)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(map_transport_error)?;

        if Self::rows(response).await?.is_empty() {
            return Err(RemoteError::NotFound);
        }
        Ok(())
    }

    async fn fetch(&self, collection: &str, id: &str) -> RemoteResult<Row> {
        let builder = self.request(self.client.get(self.table_url(collection)));
        let response = self
            .by_id(builder, id)
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or(RemoteError::NotFound)
    }

    async fn fetch_all(&self, collection: &str) -> RemoteResult<Vec<Row>> {
        let response = self
            .request(self.client.get(self.table_url(collection)))
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::rows(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

fn classify_error(status: StatusCode, body: &str) -> RemoteError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok();
    if parsed
        .as_ref()
        .and_then(|payload| payload.code.as_deref())
        .is_some_and(|code| code == NO_ROWS_CODE)
    {
        return RemoteError::NotFound;
    }

    let message = parsed
        .and_then(|payload| payload.message.or(payload.details))
        .map_or_else(|| compact_reason(body), |message| compact_reason(&message));
    RemoteError::Rejected {
        status: status.as_u16(),
        message: if message.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            message
        },
    }
}

fn map_transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        RemoteError::Network(error.to_string())
    } else {
        RemoteError::Other(error.to_string())
    }
}
