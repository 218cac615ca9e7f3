//! Integration tests for logging system

use bridge_traits::logging::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig,
};

#[test]
fn test_logging_initialization_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());

    // A global subscriber is already installed
    assert!(init_logging(config).is_err());

    tracing::info!(message_id = "m-1", "Logging initialized");
}

#[test]
fn test_provider_credentials_redacted() {
    assert_eq!(redact_if_sensitive("youtube_api_key", "AIza"), "[REDACTED]");
    assert_eq!(
        redact_if_sensitive("spotify_client_secret", "shh"),
        "[REDACTED]"
    );
    assert_eq!(redact_if_sensitive("access_token", "BQD"), "[REDACTED]");
}

#[test]
fn test_normal_values_pass_through() {
    assert_eq!(redact_if_sensitive("message_id", "m-42"), "m-42");
    assert_eq!(redact_if_sensitive("provider", "spotify"), "spotify");
    assert_eq!(redact_if_sensitive("fragment_index", "2"), "2");
}

#[test]
fn test_url_redaction() {
    let redacted =
        redact_url("https://api.soundcloud.com/tracks/1/streams?client_id=abc&secret_token=s-1");
    assert!(!redacted.contains("abc"));
    assert!(redacted.contains("client_id=REDACTED"));
    // Only exact parameter names are masked
    assert!(redacted.contains("secret_token=s-1"));

    let plain = redact_url("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC");
    assert_eq!(plain, "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_secret_redaction(false)
        .with_spans(true)
        .with_target(false)
        .with_filter("core_richmedia=debug,reqwest=info");

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_secrets);
    assert!(config.enable_spans);
    assert!(!config.display_target);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_richmedia=debug,reqwest=info")
    );
}
