//! HTTP client wrapper: the single choke point for backend calls.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every REST call goes through `ApiClient`. It authorizes requests with the
//! configured `TokenTransport`, maps non-success statuses to `ApiError`, and
//! routes 401s on authenticated calls to the registered
//! `UnauthorizedHandler` (the auth lifecycle).
//!
//! DESIGN
//! ======
//! The lifecycle needs the client to talk to the backend, and the client
//! needs the lifecycle to react to 401s. The cycle is broken by late
//! registration: the lifecycle registers a `Weak` handle once at startup.
//!
//! ERROR HANDLING
//! ==============
//! No retries and no queuing. Statuses other than 401 are returned as-is to
//! the caller; transport failures become `ApiError::Transport`.

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{COOKIE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::session::{Session, SessionStore};
use crate::transport::TokenTransport;
use crate::types::{self, MalformedResponse};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered 401.
    #[error("unauthorized: {}", message.as_deref().unwrap_or("session expired"))]
    Unauthorized { message: Option<String> },

    /// Any other non-success status.
    #[error("request failed with status {status}: {}", message.as_deref().unwrap_or("no message"))]
    Status { status: u16, message: Option<String> },

    /// No response was received.
    #[error("request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Malformed(#[from] MalformedResponse),

    #[error("request body could not be encoded: {0}")]
    Encode(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The backend's own `message`, when it sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Reaction to a 401 on a call made under session `epoch`.
#[async_trait::async_trait]
pub trait UnauthorizedHandler: Send + Sync {
    async fn on_unauthorized(&self, epoch: u64);
}

/// Whether a 401 on this call may expire the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Intercept {
    Enabled,
    Skip,
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    transport: Arc<dyn TokenTransport>,
    session: SessionStore,
    logout_timeout: Duration,
    on_unauthorized: OnceLock<Weak<dyn UnauthorizedHandler>>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: &ClientConfig, transport: Arc<dyn TokenTransport>, session: SessionStore) -> Result<Self, ApiError> {
        let builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs));
        let http = transport
            .configure(builder)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.clone(),
                transport,
                session,
                logout_timeout: Duration::from_secs(config.timeouts.logout_secs),
                on_unauthorized: OnceLock::new(),
            }),
        })
    }

    /// Register the 401 handler. Only the first registration takes effect.
    pub fn register_unauthorized_handler(&self, handler: Weak<dyn UnauthorizedHandler>) -> bool {
        self.inner.on_unauthorized.set(handler).is_ok()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn TokenTransport> {
        &self.inner.transport
    }

    pub(crate) fn logout_timeout(&self) -> Duration {
        self.inner.logout_timeout
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.dispatch(Method::GET, path, None, Intercept::Enabled).await?;
        decode(value)
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = encode(body)?;
        let value = self.dispatch(Method::POST, path, Some(body), Intercept::Enabled).await?;
        decode(value)
    }

    /// `POST` with no request body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.dispatch(Method::POST, path, None, Intercept::Enabled).await?;
        decode(value)
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = encode(body)?;
        let value = self.dispatch(Method::PUT, path, Some(body), Intercept::Enabled).await?;
        decode(value)
    }

    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.dispatch(Method::DELETE, path, None, Intercept::Enabled).await?;
        decode(value)
    }

    /// Send one request and return the decoded JSON body (`Null` when empty,
    /// a JSON string when the body is plain text).
    pub(crate) async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        intercept: Intercept,
    ) -> Result<Value, ApiError> {
        let session = self.inner.session.snapshot();
        self.send_as(&session, None, method, path, body, intercept).await
    }

    /// Like `dispatch`, but authorized with an explicit session snapshot and,
    /// under the cookie transport, the `Cookie` header of a revoked jar.
    /// Logout uses this to reach the backend after local state is cleared.
    pub(crate) async fn send_as(
        &self,
        session: &Session,
        replay_cookie: Option<&HeaderValue>,
        method: Method,
        path: &str,
        body: Option<Value>,
        intercept: Intercept,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);

        let request = self.inner.http.request(method.clone(), &url);
        let mut request = self.inner.transport.authorize(request, session)?;
        if let Some(cookie) = replay_cookie {
            request = request.header(COOKIE, cookie.clone());
        }
        let request = match &body {
            Some(json) => request.json(json),
            None => request,
        };

        tracing::debug!(%method, path, epoch = session.epoch(), "api request");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if status == 401 {
            tracing::info!(%method, path, "backend rejected credentials");
            if intercept == Intercept::Enabled && session.is_authenticated() {
                self.expire(session.epoch()).await;
            }
            return Err(ApiError::Unauthorized { message: types::error_message(&text) });
        }
        if !(200..300).contains(&status) {
            tracing::debug!(%method, path, status, "api request failed");
            return Err(ApiError::Status { status, message: types::error_message(&text) });
        }

        Ok(parse_body(&text))
    }

    async fn expire(&self, epoch: u64) {
        let handler = self.inner.on_unauthorized.get().and_then(Weak::upgrade);
        match handler {
            Some(handler) => handler.on_unauthorized(epoch).await,
            None => tracing::warn!(epoch, "401 received but no unauthorized handler is registered"),
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Malformed(MalformedResponse::new(e.to_string())))
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}
