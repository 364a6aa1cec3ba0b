//! Session store: the single source of truth for the current login.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every other component reads the session through `snapshot()` or a
//! `subscribe()` receiver. Only the auth lifecycle (this crate) mutates it;
//! the mutators are `pub(crate)` so no outside code can flip auth fields.
//!
//! DESIGN
//! ======
//! `user` and `credential` live together in one `Option<Authenticated>`, so
//! "authenticated" is derived and cannot drift from them. Each login or
//! logout bumps an epoch; requests capture the epoch they were sent under so
//! a late 401 can only expire the session it was issued against.
//!
//! Durable storage is written synchronously, under the same lock as the
//! in-memory change, so memory and disk never disagree about who is logged in.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::storage::{self, ACCESS_TOKEN_KEY, DurableStorage, USER_KEY};
use crate::transport::{BearerToken, TransportKind};
use crate::types::{Role, UserProfile};

/// The logged-in half of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Authenticated {
    user: UserProfile,
    credential: Option<BearerToken>,
}

/// Point-in-time copy of the session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    auth: Option<Authenticated>,
    loading: bool,
    error: Option<String>,
    epoch: u64,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.auth.as_ref().map(|a| &a.user)
    }

    #[must_use]
    pub fn role(&self) -> Option<&Role> {
        self.user().map(|u| &u.role)
    }

    /// Bearer credential; always `None` under the cookie strategy.
    #[must_use]
    pub fn credential(&self) -> Option<&BearerToken> {
        self.auth.as_ref().and_then(|a| a.credential.as_ref())
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Increments on every login and every logout of a live session.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Shared handle to the process-wide session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<Session>,
    changes: watch::Sender<Session>,
    storage: Arc<dyn DurableStorage>,
}

impl SessionStore {
    /// Empty session over `storage`.
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self::with_session(storage, Session::default())
    }

    /// Rebuild the session persisted by a previous run.
    ///
    /// Bearer: authenticated iff both the token and the user are stored;
    /// half-written leftovers are erased. Cookie: always starts empty since
    /// the cookie jar does not outlive the process.
    pub fn rehydrate(storage: Arc<dyn DurableStorage>, transport: TransportKind) -> Self {
        if transport == TransportKind::Cookie {
            return Self::new(storage);
        }

        let token = storage.get(ACCESS_TOKEN_KEY).and_then(BearerToken::new);
        let user = storage::load_json::<UserProfile>(storage.as_ref(), USER_KEY);
        match (token, user) {
            (Some(token), Some(user)) => {
                tracing::info!(identifier = %user.identifier, "rehydrated persisted session");
                let session = Session {
                    auth: Some(Authenticated { user, credential: Some(token) }),
                    loading: false,
                    error: None,
                    epoch: 1,
                };
                Self::with_session(storage, session)
            }
            (None, None) => Self::new(storage),
            _ => {
                tracing::warn!("discarding incomplete persisted session");
                erase_persisted(storage.as_ref());
                Self::new(storage)
            }
        }
    }

    fn with_session(storage: Arc<dyn DurableStorage>, session: Session) -> Self {
        let (changes, _) = watch::channel(session.clone());
        Self { inner: Arc::new(StoreInner { state: Mutex::new(session), changes, storage }) }
    }

    /// Copy of the current session. No side effects.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// Receiver that observes every committed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.changes.subscribe()
    }

    /// Reset the user-facing error, e.g. when a form is reopened.
    pub fn clear_error(&self) {
        self.commit(|s| s.error = None);
    }

    // =========================================================================
    // LIFECYCLE-ONLY MUTATORS
    // =========================================================================

    /// Mark the session logged in and persist it. Returns the new epoch.
    pub(crate) fn set_authenticated(&self, user: UserProfile, credential: Option<BearerToken>) -> u64 {
        let mut state = self.lock();
        persist(self.inner.storage.as_ref(), &user, credential.as_ref());
        state.auth = Some(Authenticated { user, credential });
        state.epoch += 1;
        let epoch = state.epoch;
        self.publish(&state);
        epoch
    }

    /// Reset to an empty session and erase persisted copies.
    pub(crate) fn clear(&self) {
        let mut state = self.lock();
        clear_locked(&mut state, self.inner.storage.as_ref());
        self.publish(&state);
    }

    /// Clear only if the session is still the authenticated one at `epoch`.
    /// Returns whether this call did the clearing.
    pub(crate) fn clear_if_epoch(&self, epoch: u64) -> bool {
        let mut state = self.lock();
        if !state.is_authenticated() || state.epoch != epoch {
            return false;
        }
        clear_locked(&mut state, self.inner.storage.as_ref());
        self.publish(&state);
        true
    }

    /// Replace the stored user of the session at `epoch` with a fresher copy.
    /// Returns `false` (and changes nothing) if that session is gone.
    pub(crate) fn refresh_user(&self, epoch: u64, user: UserProfile) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        let Some(auth) = state.auth.as_mut() else {
            return false;
        };
        if let Err(e) = storage::save_json(self.inner.storage.as_ref(), USER_KEY, &user) {
            tracing::warn!(error = %e, "failed to persist refreshed user profile");
        }
        auth.user = user;
        self.publish(&state);
        true
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.commit(|s| s.loading = loading);
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        self.commit(|s| s.error = error);
    }

    fn commit(&self, change: impl FnOnce(&mut Session)) {
        let mut state = self.lock();
        change(&mut state);
        self.publish(&state);
    }

    fn publish(&self, state: &Session) {
        self.inner.changes.send_replace(state.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn clear_locked(state: &mut Session, storage: &dyn DurableStorage) {
    erase_persisted(storage);
    if state.auth.take().is_some() {
        state.epoch += 1;
    }
    state.loading = false;
    state.error = None;
}

fn persist(storage: &dyn DurableStorage, user: &UserProfile, credential: Option<&BearerToken>) {
    let token_write = match credential {
        Some(token) => storage.set(ACCESS_TOKEN_KEY, token.as_str()),
        None => storage.remove(ACCESS_TOKEN_KEY),
    };
    if let Err(e) = token_write {
        tracing::warn!(error = %e, "failed to persist access token");
    }
    if let Err(e) = storage::save_json(storage, USER_KEY, user) {
        tracing::warn!(error = %e, "failed to persist user profile");
    }
}

fn erase_persisted(storage: &dyn DurableStorage) {
    for key in [ACCESS_TOKEN_KEY, USER_KEY] {
        if let Err(e) = storage.remove(key) {
            tracing::warn!(key, error = %e, "failed to erase persisted session entry");
        }
    }
}
