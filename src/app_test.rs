use std::path::PathBuf;

use super::*;
use crate::navigation::{History, NavigationMode};
use crate::test_support::{FakeBackend, PASSWORD};
use crate::transport::TransportKind;
use crate::types::LoginForm;

fn temp_session_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("dayflow-app-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}

#[test]
fn open_storage_uses_memory_without_session_file() {
    let config = ClientConfig::new("http://localhost:8081").unwrap();
    let storage = open_storage(&config).unwrap();
    assert!(storage.get(crate::storage::USER_KEY).is_none());
}

#[tokio::test]
async fn bearer_session_survives_restart() {
    let backend = FakeBackend::start().await;
    let config = backend.config(TransportKind::Bearer).with_session_file(temp_session_file());

    {
        let app = App::bootstrap(&config, open_storage(&config).unwrap(), Arc::new(History::new())).unwrap();
        app.lifecycle().login(LoginForm::new("a@b.com", PASSWORD)).await.unwrap();
    }

    let history = Arc::new(History::new());
    let app = App::bootstrap(&config, open_storage(&config).unwrap(), history.clone()).unwrap();
    let session = app.session().snapshot();
    assert!(session.is_authenticated());
    assert_eq!(session.user().map(|u| u.identifier.as_str()), Some("a@b.com"));

    let profile = app.hr().profile().await.unwrap();
    assert_eq!(profile.identifier, "a@b.com");
    assert_eq!(app.visit(&Route::Profile), GuardDecision::Render(Route::Profile));
    assert_eq!(history.entries(), vec![(Route::Profile, NavigationMode::Push)]);
}

#[tokio::test]
async fn cookie_session_does_not_survive_restart() {
    let backend = FakeBackend::start().await;
    let config = backend.config(TransportKind::Cookie).with_session_file(temp_session_file());

    {
        let app = App::bootstrap(&config, open_storage(&config).unwrap(), Arc::new(History::new())).unwrap();
        app.lifecycle().login(LoginForm::new("a@b.com", PASSWORD)).await.unwrap();
        assert!(app.session().snapshot().is_authenticated());
    }

    let history = Arc::new(History::new());
    let app = App::bootstrap(&config, open_storage(&config).unwrap(), history.clone()).unwrap();
    assert!(!app.session().snapshot().is_authenticated());
    assert_eq!(app.visit(&Route::Company), GuardDecision::Redirect(Route::Login));
    assert_eq!(history.current(), Some(Route::Login));
}

#[tokio::test]
async fn logout_removes_persisted_session() {
    let backend = FakeBackend::start().await;
    let config = backend.config(TransportKind::Bearer).with_session_file(temp_session_file());

    let app = App::bootstrap(&config, open_storage(&config).unwrap(), Arc::new(History::new())).unwrap();
    app.lifecycle().login(LoginForm::new("a@b.com", PASSWORD)).await.unwrap();
    app.lifecycle().logout().await;

    let reopened = App::bootstrap(&config, open_storage(&config).unwrap(), Arc::new(History::new())).unwrap();
    assert!(!reopened.session().snapshot().is_authenticated());
}
