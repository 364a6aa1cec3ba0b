//! Auth lifecycle: login, signup, logout, and forced expiry.
//!
//! SYSTEM CONTEXT
//! ==============
//! The only writer of the session's auth fields. Views call `login`,
//! `signup` and `logout`; the HTTP client calls back into `expire` when an
//! authenticated request gets a 401.
//!
//! DESIGN
//! ======
//! Each operation moves through `Idle -> Pending -> Fulfilled | Rejected`.
//! Every invocation takes an attempt id from one counter. A login result is
//! applied only if no newer login and no logout began after it; older
//! results are dropped as `AuthError::Superseded`. In-flight calls are
//! never cancelled.
//!
//! Lock order: the attempt ledger, then the session store. Neither lock is
//! held across `.await`.
//!
//! ERROR HANDLING
//! ==============
//! Validation failures return before any network call. Backend rejections
//! set the session's `error` to the server message or a fixed fallback.
//! Logout never fails from the caller's point of view: local state and the
//! transport's proof of identity are dropped first, and the backend call is
//! best-effort and bounded by the logout timeout.

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use reqwest::header::HeaderValue;
use serde_json::{Value, json};

use crate::api::{ApiClient, ApiError, Intercept, UnauthorizedHandler};
use crate::hr::PROFILE_PATH;
use crate::navigation::{NavigationMode, Navigator};
use crate::routes::Route;
use crate::session::{Session, SessionStore};
use crate::transport::BearerToken;
use crate::types::{self, LoginForm, LoginResponse, MalformedResponse, SignupForm, SignupResponse, UserProfile};
use crate::validation::{self, FieldErrors};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const SIGNUP_PATH: &str = "/api/auth/sign-up";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Please check your credentials.";
pub const SIGNUP_FALLBACK_MESSAGE: &str = "Signup failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Signup,
    Logout,
}

impl Operation {
    const ALL: usize = 3;

    fn index(self) -> usize {
        match self {
            Self::Login => 0,
            Self::Signup => 1,
            Self::Logout => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    Validation(FieldErrors),

    /// The backend (or the network) refused the request.
    #[error("{message}")]
    Rejected { message: String, status: Option<u16> },

    /// A newer attempt started before this one resolved.
    #[error("superseded by a newer attempt")]
    Superseded,

    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
}

impl AuthError {
    fn rejected(err: &ApiError, fallback: &str) -> Self {
        Self::Rejected {
            message: err.server_message().unwrap_or(fallback).to_owned(),
            status: err.status(),
        }
    }

    /// Text shown to the user for this failure.
    fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            _ => fallback.to_owned(),
        }
    }
}

// =============================================================================
// ATTEMPT LEDGER
// =============================================================================

#[derive(Debug, Default)]
struct Ledger {
    last_attempt: u64,
    latest: [u64; Operation::ALL],
    phases: [Phase; Operation::ALL],
}

impl Ledger {
    fn begin(&mut self, op: Operation) -> u64 {
        self.last_attempt += 1;
        self.latest[op.index()] = self.last_attempt;
        self.phases[op.index()] = Phase::Pending;
        self.last_attempt
    }

    fn is_latest(&self, op: Operation, attempt: u64) -> bool {
        self.latest[op.index()] == attempt
    }

    /// Record the outcome of `attempt` unless a newer one replaced it.
    fn settle(&mut self, op: Operation, attempt: u64, phase: Phase) {
        if self.is_latest(op, attempt) {
            self.phases[op.index()] = phase;
        }
    }

    /// Make any pending attempt of `op` stale.
    fn invalidate(&mut self, op: Operation) {
        self.last_attempt += 1;
        self.latest[op.index()] = self.last_attempt;
        if self.phases[op.index()] == Phase::Pending {
            self.phases[op.index()] = Phase::Idle;
        }
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// A session that has been ended locally, kept just long enough to tell the
/// backend which session to end.
struct Retired {
    session: Session,
    /// `Cookie` header taken out of the revoked jar (cookie transport only).
    cookie: Option<HeaderValue>,
}

/// Shared handle to the auth state machine.
#[derive(Clone)]
pub struct AuthLifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
    ledger: Mutex<Ledger>,
}

impl AuthLifecycle {
    /// Build the lifecycle and register it as `api`'s 401 handler.
    pub fn new(api: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        let inner = Arc::new(LifecycleInner { api, navigator, ledger: Mutex::new(Ledger::default()) });
        let handler: Arc<dyn UnauthorizedHandler> = inner.clone();
        if !inner.api.register_unauthorized_handler(Arc::downgrade(&handler)) {
            tracing::warn!("api client already has an unauthorized handler; keeping the first one");
        }
        Self { inner }
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.inner.api.session()
    }

    #[must_use]
    pub fn phase(&self, op: Operation) -> Phase {
        self.inner.ledger().phases[op.index()]
    }

    /// Log in with an email or employee id.
    ///
    /// # Errors
    ///
    /// `Validation` before any network call, `Rejected` when the backend
    /// refuses, `Malformed` on an unusable body, `Superseded` when a newer
    /// login or a logout started first.
    pub async fn login(&self, form: LoginForm) -> Result<UserProfile, AuthError> {
        validation::validate_login(&form).map_err(AuthError::Validation)?;
        let attempt = self.inner.begin(Operation::Login);
        tracing::info!(attempt, identifier = %form.identifier.trim(), "login started");

        let body = json!({ "identifier": form.identifier.trim(), "password": form.password });
        let outcome = match self.inner.api.dispatch(Method::POST, LOGIN_PATH, Some(body), Intercept::Skip).await {
            Ok(body) => self.inner.accept_login(body),
            Err(e) => Err(AuthError::rejected(&e, LOGIN_FALLBACK_MESSAGE)),
        };
        self.inner.finish_login(attempt, outcome)
    }

    /// Register a company and its first HR account. Never logs in.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`AuthLifecycle::login`].
    pub async fn signup(&self, form: SignupForm) -> Result<SignupResponse, AuthError> {
        validation::validate_signup(&form).map_err(AuthError::Validation)?;
        let body = serde_json::to_value(&form)
            .map_err(|e| AuthError::rejected(&ApiError::Encode(e.to_string()), SIGNUP_FALLBACK_MESSAGE))?;
        let attempt = self.inner.begin(Operation::Signup);
        tracing::info!(attempt, email = %form.email, "signup started");

        let outcome = match self.inner.api.dispatch(Method::POST, SIGNUP_PATH, Some(body), Intercept::Skip).await {
            Ok(body) => SignupResponse::parse(body).map_err(AuthError::from),
            Err(e) => Err(AuthError::rejected(&e, SIGNUP_FALLBACK_MESSAGE)),
        };
        self.inner.finish_signup(attempt, outcome)
    }

    /// End the session locally, then tell the backend. Safe to call twice.
    pub async fn logout(&self) {
        let (attempt, retired) = self.inner.begin_logout();
        let backend_ok = if retired.session.is_authenticated() {
            self.inner.backend_logout(&retired).await
        } else {
            true
        };
        self.inner.finish_logout(attempt, backend_ok);
        tracing::info!(attempt, backend_ok, "logged out");
    }

    /// Confirm a rehydrated session against the backend and refresh the
    /// stored user from the answer.
    ///
    /// Returns `None` when there is nothing to confirm. A 401 expires the
    /// session through the usual interceptor path. If the session changed
    /// while the profile was in flight, the newer session is left alone.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the profile call.
    pub async fn restore(&self) -> Result<Option<UserProfile>, ApiError> {
        let session = self.session().snapshot();
        if !session.is_authenticated() {
            return Ok(None);
        }
        let body: Value = self.inner.api.get(PROFILE_PATH).await?;
        let user = types::parse_user(body)?;
        if self.session().refresh_user(session.epoch(), user.clone()) {
            tracing::info!(identifier = %user.identifier, "persisted session confirmed");
        } else {
            tracing::debug!(epoch = session.epoch(), "session changed while confirming; keeping the newer one");
        }
        Ok(Some(user))
    }

    /// Handle a 401 for a request sent under `epoch`.
    pub async fn expire(&self, epoch: u64) {
        self.inner.expire(epoch).await;
    }
}

impl LifecycleInner {
    fn session(&self) -> &SessionStore {
        self.api.session()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, op: Operation) -> u64 {
        let mut ledger = self.ledger();
        let attempt = ledger.begin(op);
        self.session().set_error(None);
        self.session().set_loading(true);
        attempt
    }

    fn accept_login(&self, body: Value) -> Result<(UserProfile, Option<BearerToken>), AuthError> {
        let response = LoginResponse::parse(body)?;
        let credential = self.api.transport().credential_from_login(&response)?;
        Ok((response.user, credential))
    }

    fn finish_login(
        &self,
        attempt: u64,
        outcome: Result<(UserProfile, Option<BearerToken>), AuthError>,
    ) -> Result<UserProfile, AuthError> {
        let mut ledger = self.ledger();
        if !ledger.is_latest(Operation::Login, attempt) {
            tracing::info!(attempt, "discarding superseded login result");
            // A cookie set by this response must not outlive the logout that
            // superseded it. A newer pending login will set its own.
            let newer_login_pending = ledger.phases[Operation::Login.index()] == Phase::Pending;
            if !newer_login_pending && !self.session().snapshot().is_authenticated() {
                self.retire_proof();
            }
            return Err(AuthError::Superseded);
        }

        match outcome {
            Ok((user, credential)) => {
                let epoch = self.session().set_authenticated(user.clone(), credential);
                self.session().set_loading(false);
                ledger.settle(Operation::Login, attempt, Phase::Fulfilled);
                tracing::info!(attempt, epoch, identifier = %user.identifier, role = %user.role, "login succeeded");
                Ok(user)
            }
            Err(err) => {
                self.session().set_error(Some(err.user_message(LOGIN_FALLBACK_MESSAGE)));
                self.session().set_loading(false);
                ledger.settle(Operation::Login, attempt, Phase::Rejected);
                tracing::warn!(attempt, error = %err, "login failed");
                Err(err)
            }
        }
    }

    fn finish_signup(
        &self,
        attempt: u64,
        outcome: Result<SignupResponse, AuthError>,
    ) -> Result<SignupResponse, AuthError> {
        let mut ledger = self.ledger();
        let latest = ledger.is_latest(Operation::Signup, attempt);
        match &outcome {
            Ok(response) => {
                if latest {
                    self.session().set_loading(false);
                }
                ledger.settle(Operation::Signup, attempt, Phase::Fulfilled);
                tracing::info!(attempt, message = response.message.as_deref().unwrap_or(""), "signup succeeded");
            }
            Err(err) => {
                if latest {
                    self.session().set_error(Some(err.user_message(SIGNUP_FALLBACK_MESSAGE)));
                    self.session().set_loading(false);
                }
                ledger.settle(Operation::Signup, attempt, Phase::Rejected);
                tracing::warn!(attempt, error = %err, "signup failed");
            }
        }
        outcome
    }

    /// Clear the session, revoke the transport's proof, and return both.
    fn begin_logout(&self) -> (u64, Retired) {
        let mut ledger = self.ledger();
        ledger.invalidate(Operation::Login);
        let attempt = ledger.begin(Operation::Logout);
        let session = self.session().snapshot();
        self.session().clear();
        let cookie = self.retire_proof();
        (attempt, Retired { session, cookie })
    }

    fn retire_proof(&self) -> Option<HeaderValue> {
        self.api.transport().revoke(self.api.base_url())
    }

    fn finish_logout(&self, attempt: u64, backend_ok: bool) {
        let phase = if backend_ok { Phase::Fulfilled } else { Phase::Rejected };
        self.ledger().settle(Operation::Logout, attempt, phase);
    }

    /// Best-effort `POST /api/auth/logout` on behalf of `retired`.
    async fn backend_logout(&self, retired: &Retired) -> bool {
        let call = self.api.send_as(
            &retired.session,
            retired.cookie.as_ref(),
            Method::POST,
            LOGOUT_PATH,
            None,
            Intercept::Skip,
        );
        match tokio::time::timeout(self.api.logout_timeout(), call).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "backend logout failed; local session already cleared");
                false
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.api.logout_timeout(), "backend logout timed out; local session already cleared");
                false
            }
        }
    }

    async fn expire(&self, epoch: u64) {
        let claimed = {
            let mut ledger = self.ledger();
            let session = self.session().snapshot();
            if self.session().clear_if_epoch(epoch) {
                ledger.invalidate(Operation::Login);
                let attempt = ledger.begin(Operation::Logout);
                let cookie = self.retire_proof();
                Some((attempt, Retired { session, cookie }))
            } else {
                None
            }
        };
        let Some((attempt, retired)) = claimed else {
            tracing::debug!(epoch, "401 for a session that is already gone");
            return;
        };

        tracing::warn!(epoch, attempt, "session rejected by backend; logging out");
        self.navigator.navigate(&Route::Login, NavigationMode::HardReload);
        let backend_ok = self.backend_logout(&retired).await;
        self.finish_logout(attempt, backend_ok);
    }
}

#[async_trait::async_trait]
impl UnauthorizedHandler for LifecycleInner {
    async fn on_unauthorized(&self, epoch: u64) {
        self.expire(epoch).await;
    }
}
