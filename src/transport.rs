//! Token transport strategies: how the credential reaches the backend.
//!
//! DESIGN
//! ======
//! Two strategies, chosen once from configuration and never mixed:
//! - `CookieTransport`: the HTTP client owns a cookie jar; the backend's
//!   `Set-Cookie` is replayed automatically and application state never sees
//!   the credential. Logout swaps in an empty jar so no later request can
//!   replay the old cookie.
//! - `BearerTransport`: the login body carries `accessToken`; it lives in the
//!   session (mirrored to durable storage) and is attached as
//!   `Authorization: Bearer <token>` on every call.

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{AUTHORIZATION, HeaderValue, InvalidHeaderValue};
use reqwest::{ClientBuilder, RequestBuilder, Url};

use crate::session::Session;
use crate::types::{LoginResponse, MalformedResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Bearer,
    Cookie,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::Cookie => "cookie",
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(Self::Bearer),
            "cookie" => Ok(Self::Cookie),
            other => Err(other.to_owned()),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque bearer credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token exactly as issued; blank input yields `None`.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return None;
        }
        Some(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>`, flagged sensitive so it is kept out of logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Strategy seam used by the HTTP client wrapper and the auth lifecycle.
pub trait TokenTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Adjust the shared HTTP client before it is built.
    fn configure(&self, builder: ClientBuilder) -> ClientBuilder;

    /// Attach proof of identity to one outgoing request.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be encoded as a header.
    fn authorize(&self, request: RequestBuilder, session: &Session) -> Result<RequestBuilder, InvalidHeaderValue>;

    /// Extract the credential the session should hold after a successful login.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the strategy needs a credential the body lacks.
    fn credential_from_login(&self, response: &LoginResponse) -> Result<Option<BearerToken>, MalformedResponse>;

    /// Drop any proof of identity the transport holds outside the session.
    ///
    /// Returns the `Cookie` header the transport would have sent to
    /// `base_url`, so the backend logout can still name the session it ends.
    fn revoke(&self, base_url: &str) -> Option<HeaderValue>;
}

/// Build the strategy selected by configuration.
#[must_use]
pub fn for_kind(kind: TransportKind) -> Arc<dyn TokenTransport> {
    match kind {
        TransportKind::Bearer => Arc::new(BearerTransport),
        TransportKind::Cookie => Arc::new(CookieTransport::new()),
    }
}

// =============================================================================
// BEARER
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTransport;

impl TokenTransport for BearerTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bearer
    }

    fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        builder
    }

    fn authorize(&self, request: RequestBuilder, session: &Session) -> Result<RequestBuilder, InvalidHeaderValue> {
        match session.credential() {
            Some(token) => Ok(request.header(AUTHORIZATION, token.header_value()?)),
            None => Ok(request),
        }
    }

    fn credential_from_login(&self, response: &LoginResponse) -> Result<Option<BearerToken>, MalformedResponse> {
        response
            .access_token
            .as_deref()
            .and_then(BearerToken::new)
            .map(Some)
            .ok_or_else(|| MalformedResponse::new("login response has no accessToken"))
    }

    fn revoke(&self, _base_url: &str) -> Option<HeaderValue> {
        None
    }
}

// =============================================================================
// COOKIE
// =============================================================================

/// Cookie store whose contents can be thrown away in one step.
///
/// `reqwest::cookie::Jar` has no way to forget cookies, so the jar lives
/// behind a lock and revocation replaces it with an empty one.
#[derive(Debug, Default)]
pub struct SessionCookies {
    jar: RwLock<Jar>,
}

impl SessionCookies {
    /// Replace the jar and return the `Cookie` header the old one held for `url`.
    pub fn revoke(&self, url: Option<&Url>) -> Option<HeaderValue> {
        let mut jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
        let retired = url.and_then(|url| jar.cookies(url));
        *jar = Jar::default();
        retired
    }

    fn read(&self) -> RwLockReadGuard<'_, Jar> {
        self.jar.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.read().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.read().cookies(url)
    }
}

/// Cookie-jar transport. The jar is process-local, so a restart starts logged out.
#[derive(Debug, Clone, Default)]
pub struct CookieTransport {
    jar: Arc<SessionCookies>,
}

impl CookieTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cookies(&self) -> &Arc<SessionCookies> {
        &self.jar
    }
}

impl TokenTransport for CookieTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Cookie
    }

    fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        builder.cookie_provider(Arc::clone(&self.jar))
    }

    fn authorize(&self, request: RequestBuilder, _session: &Session) -> Result<RequestBuilder, InvalidHeaderValue> {
        Ok(request)
    }

    fn credential_from_login(&self, _response: &LoginResponse) -> Result<Option<BearerToken>, MalformedResponse> {
        Ok(None)
    }

    fn revoke(&self, base_url: &str) -> Option<HeaderValue> {
        self.jar.revoke(Url::parse(base_url).ok().as_ref())
    }
}
