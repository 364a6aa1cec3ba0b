use super::*;

/// # Safety
/// Env-mutating tests share process state; each one clears what it sets.
unsafe fn clear_dayflow_env() {
    unsafe {
        std::env::remove_var("DAYFLOW_API_BASE_URL");
        std::env::remove_var("DAYFLOW_TOKEN_TRANSPORT");
        std::env::remove_var("DAYFLOW_SESSION_FILE");
        std::env::remove_var("DAYFLOW_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("DAYFLOW_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("DAYFLOW_LOGOUT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults_and_overrides() {
    unsafe { clear_dayflow_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.transport, TransportKind::Bearer);
    assert_eq!(cfg.session_file, None);
    assert_eq!(cfg.timeouts, Timeouts::default());

    unsafe {
        std::env::set_var("DAYFLOW_API_BASE_URL", "https://hr.example.test/");
        std::env::set_var("DAYFLOW_TOKEN_TRANSPORT", "cookie");
        std::env::set_var("DAYFLOW_SESSION_FILE", "/tmp/dayflow/session.json");
        std::env::set_var("DAYFLOW_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("DAYFLOW_CONNECT_TIMEOUT_SECS", "not-a-number");
        std::env::set_var("DAYFLOW_LOGOUT_TIMEOUT_SECS", "2");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://hr.example.test");
    assert_eq!(cfg.transport, TransportKind::Cookie);
    assert_eq!(cfg.session_file, Some(PathBuf::from("/tmp/dayflow/session.json")));
    assert_eq!(
        cfg.timeouts,
        Timeouts { request_secs: 5, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS, logout_secs: 2 }
    );

    unsafe {
        std::env::set_var("DAYFLOW_TOKEN_TRANSPORT", "jwt");
    }
    let err = ClientConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("unknown DAYFLOW_TOKEN_TRANSPORT"));

    unsafe { clear_dayflow_env() };
}

#[test]
fn new_trims_trailing_slash() {
    let cfg = ClientConfig::new("http://localhost:8081/").unwrap();
    assert_eq!(cfg.base_url, "http://localhost:8081");
}

#[test]
fn new_rejects_non_http_urls() {
    assert!(matches!(ClientConfig::new("localhost:8081"), Err(ConfigError::InvalidBaseUrl(_))));
    assert!(matches!(ClientConfig::new("http://"), Err(ConfigError::InvalidBaseUrl(_))));
}

#[test]
fn parse_transport_defaults_to_bearer() {
    assert_eq!(parse_transport(None).unwrap(), TransportKind::Bearer);
    assert_eq!(parse_transport(Some("COOKIE")).unwrap(), TransportKind::Cookie);
    assert!(parse_transport(Some("")).is_err());
}

#[test]
fn builders_override_fields() {
    let cfg = ClientConfig::new("http://localhost:1")
        .unwrap()
        .with_transport(TransportKind::Cookie)
        .with_session_file("s.json")
        .with_timeouts(Timeouts { request_secs: 1, connect_secs: 2, logout_secs: 3 });
    assert_eq!(cfg.transport, TransportKind::Cookie);
    assert_eq!(cfg.session_file, Some(PathBuf::from("s.json")));
    assert_eq!(cfg.timeouts.connect_secs, 2);
}
