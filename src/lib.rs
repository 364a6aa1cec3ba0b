//! # dayflow
//!
//! Client-side session and auth lifecycle for the Dayflow HR service.
//!
//! This crate owns the session store, the token transport strategies
//! (cookie jar or bearer header), the HTTP client wrapper with its 401
//! interceptor, the login/signup/logout state machine, and the route guard
//! in front of the HR views. The `dayflow-cli` binary drives it from a
//! terminal.

pub mod api;
pub mod app;
pub mod config;
pub mod hr;
pub mod lifecycle;
pub mod navigation;
pub mod routes;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, UnauthorizedHandler};
pub use app::App;
pub use config::{ClientConfig, ConfigError};
pub use lifecycle::{AuthError, AuthLifecycle, Operation, Phase};
pub use navigation::{History, NavigationMode, Navigator};
pub use routes::{GuardDecision, Route};
pub use session::{Session, SessionStore};
pub use transport::TransportKind;
pub use types::{LoginForm, Role, SignupForm, UserProfile};
