//! HTTP transport for the chat backend
//!
//! This module implements [`HttpTransport`], a thin reqwest client over the
//! backend's REST surface plus the streamed `POST /chat` endpoint.
//!
//! # Chat streaming
//!
//! `POST /chat` answers `200` with an unframed `text/event-stream` body: the
//! assistant reply as raw text, chunked however the network delivers it.
//! When the request created a new session the response also carries an
//! `X-Session-Id` header. The header is read once, before the body is
//! touched; the body is then exposed chunk by chunk through
//! [`cancellable_body`], never buffered in full.
//!
//! # Cancellation
//!
//! The request future and every body read are raced against the
//! [`RequestToken`]. Losing the race drops the reqwest future or stream,
//! which closes the connection, and the caller sees [`ChatError::Cancelled`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::cancel::RequestToken;
use crate::config::BackendConfig;
use crate::error::{ChatError, Result};
use crate::transport::{cancellable_body, ChatResponse, Transport, SESSION_ID_HEADER};
use crate::types::{ChatRequest, Message, ModelInfo, Session};

/// reqwest-backed [`Transport`] implementation
///
/// # Examples
///
/// ```no_run
/// use madlen_chat::config::BackendConfig;
/// use madlen_chat::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new(&BackendConfig::default()).unwrap();
/// assert_eq!(transport.base_url().as_str(), "http://localhost:8000/");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Underlying reqwest HTTP client.
    http_client: reqwest::Client,
    /// Backend root; endpoint paths are appended to it.
    base_url: url::Url,
}

impl HttpTransport {
    /// Construct a transport from backend configuration
    ///
    /// Only a connect timeout is applied; streamed replies may take as long
    /// as the backend needs.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if the base URL does not parse, or
    /// [`ChatError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = url::Url::parse(&config.base_url).map_err(|e| {
            ChatError::Config(format!("Invalid backend base_url {}: {}", config.base_url, e))
        })?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let http_client = builder.build().map_err(ChatError::from)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// The configured backend root
    pub fn base_url(&self) -> &url::Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "GET");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(network_failure)?;
        let response = ensure_success(response).await?;

        let value = response.json::<T>().await.map_err(|e| {
            ChatError::BackendFailure {
                status: StatusCode::OK.as_u16(),
                message: format!("unexpected response body from {}: {}", path, e),
            }
        })?;
        Ok(value)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.get_json("models").await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.get_json("sessions").await
    }

    async fn session_history(&self, session_id: i64) -> Result<Vec<Message>> {
        self.get_json(&format!("sessions/{}", session_id)).await
    }

    async fn delete_session(&self, session_id: i64) -> Result<()> {
        let url = self.endpoint(&format!("sessions/{}", session_id));
        tracing::debug!(%url, "DELETE");

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(network_failure)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(session_id, "Session already deleted");
            return Ok(());
        }

        ensure_success(response).await?;
        Ok(())
    }

    async fn send_chat(&self, request: ChatRequest, token: RequestToken) -> Result<ChatResponse> {
        if token.is_cancelled() {
            return Err(ChatError::Cancelled.into());
        }

        let url = self.endpoint("chat");
        tracing::debug!(
            %url,
            model = %request.model,
            session_id = ?request.session_id,
            has_image = request.image_base64.is_some(),
            "POST chat"
        );

        let pending = self.http_client.post(&url).json(&request).send();
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ChatError::Cancelled.into()),
            response = pending => response.map_err(network_failure)?,
        };

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ChatError::Cancelled.into()),
            response = ensure_success(response) => response?,
        };

        let session_id_hint = session_id_from_headers(response.headers());
        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| anyhow::Error::from(ChatError::NetworkFailure(e.to_string())))
        });

        Ok(ChatResponse {
            session_id_hint,
            body: cancellable_body(body, token),
        })
    }
}

/// Map a reqwest failure to [`ChatError::NetworkFailure`]
fn network_failure(error: reqwest::Error) -> anyhow::Error {
    ChatError::NetworkFailure(error.to_string()).into()
}

/// Pass successful responses through; turn anything else into a
/// [`ChatError::BackendFailure`] carrying the body text.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };

    Err(ChatError::BackendFailure {
        status: status.as_u16(),
        message,
    }
    .into())
}

/// Extract the backend-assigned session id, ignoring malformed values
pub(crate) fn session_id_from_headers(headers: &HeaderMap) -> Option<i64> {
    let raw = headers.get(SESSION_ID_HEADER)?;
    match raw.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(id) => Some(id),
        None => {
            tracing::warn!(value = ?raw, "Ignoring malformed {} header", SESSION_ID_HEADER);
            None
        }
    }
}
