use agent_gateway::config::{AppConfig, ConfigError, RateLimitConfig};
use config::Config;

fn from_yaml(yaml: &str) -> AppConfig {
    Config::builder()
        .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize app config")
}

#[test]
fn test_minimal_config_uses_defaults() {
    let app_config = from_yaml(
        r#"
database_url: "sqlite::memory:"
api_key_pepper: "0123456789abcdef0123456789abcdef"
"#,
    );

    assert_eq!(app_config.bind_address, "0.0.0.0:8080");
    assert_eq!(app_config.settings_path, "/settings");
    assert!(app_config.public_base_url.is_none());
    assert!(!app_config.oauth.require_pkce);
    assert!(!app_config.oauth.github.is_configured());
    assert_eq!(
        app_config.oauth.github.authorize_url,
        "https://github.com/login/oauth/authorize"
    );
    assert_eq!(app_config.oauth.github.scope, "read:user");
    assert_eq!(app_config.rate_limit.requests_per_window, 120);
    assert_eq!(app_config.rate_limit.window_secs, 60);
    assert_eq!(app_config.rate_limit.max_entries, 100_000);
    assert_eq!(app_config.rate_limit.exempt_path_fragments, vec!["/stream"]);
    assert!(app_config.validate().is_ok());
}

#[test]
fn test_full_config_deserialization() {
    let app_config = from_yaml(
        r#"
database_url: "postgres://localhost/gateway"
bind_address: "127.0.0.1:9000"
public_base_url: "https://api.example.com"
settings_path: "/account/keys"
api_key_pepper: "0123456789abcdef0123456789abcdef"
oauth:
  require_pkce: true
  provider_timeout_ms: 4000
  callback_timeout_ms: 8000
  github:
    client_id: "Iv1.abc"
    client_secret: "shh"
    scope: "read:user user:email"
rate_limit:
  requests_per_window: 10
  window_secs: 5
  max_entries: 50
  sweep_interval_secs: 30
  exempt_path_fragments: ["/stream", "/events"]
"#,
    );

    assert_eq!(app_config.database_url, "postgres://localhost/gateway");
    assert_eq!(
        app_config.public_base_url.as_deref(),
        Some("https://api.example.com")
    );
    assert!(app_config.oauth.require_pkce);
    assert_eq!(app_config.oauth.provider_timeout_ms, 4000);
    assert_eq!(app_config.oauth.callback_timeout_ms, 8000);
    assert!(app_config.oauth.github.is_configured());
    assert_eq!(app_config.oauth.github.scope, "read:user user:email");
    assert_eq!(
        app_config.oauth.github.token_url,
        "https://github.com/login/oauth/access_token"
    );
    assert_eq!(app_config.rate_limit.max_entries, 50);
    assert_eq!(app_config.rate_limit.exempt_path_fragments.len(), 2);
    assert!(app_config.validate().is_ok());
}

#[test]
fn test_missing_pepper_fails_deserialization() {
    let result: Result<AppConfig, _> = Config::builder()
        .add_source(config::File::from_str(
            r#"database_url: "sqlite::memory:""#,
            config::FileFormat::Yaml,
        ))
        .build()
        .expect("Failed to build config")
        .try_deserialize();
    assert!(result.is_err());
}

#[test]
fn test_zero_window_is_rejected() {
    let mut app_config = from_yaml(
        r#"
database_url: "sqlite::memory:"
api_key_pepper: "0123456789abcdef0123456789abcdef"
"#,
    );
    app_config.rate_limit = RateLimitConfig {
        window_secs: 0,
        ..RateLimitConfig::default()
    };
    assert!(matches!(
        app_config.validate(),
        Err(ConfigError::Validation(_))
    ));
}
