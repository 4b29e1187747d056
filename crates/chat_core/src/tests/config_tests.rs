use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_target_local_chat_endpoint() {
    let config = ChatConfig::default();
    assert_eq!(config.endpoint, "http://localhost:11434/api/chat");
    assert_eq!(config.model, "llama3");
    assert_eq!(config.api_key, None);
    assert_eq!(config.request_shape(), RequestShape::Chat);
    config.validate().expect("defaults are valid");
}

#[test]
fn request_shape_inferred_from_endpoint_path() {
    let config = ChatConfig {
        endpoint: "http://localhost:11434/api/generate".into(),
        ..ChatConfig::default()
    };
    assert_eq!(config.request_shape(), RequestShape::Completion);

    let pinned = ChatConfig {
        request_shape: Some(RequestShape::Chat),
        ..config
    };
    assert_eq!(pinned.request_shape(), RequestShape::Chat);
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let config = parse_config(
        r#"
        endpoint = "https://api.ollama.com/api/chat"
        api_key = "secret"
        request_shape = "generate"
        "#,
    )
    .expect("parse");
    assert_eq!(config.endpoint, "https://api.ollama.com/api/chat");
    assert_eq!(config.api_key.as_deref(), Some("secret"));
    assert_eq!(config.model, "llama3");
    assert_eq!(config.greeting, DEFAULT_GREETING);
    assert_eq!(config.request_shape(), RequestShape::Completion);
}

#[test]
fn env_overrides_file_values_and_app_prefix_wins() {
    let mut config = parse_config(r#"model = "from-file""#).expect("parse");
    apply_env_overrides(
        &mut config,
        lookup_from(&[
            ("CHAT_MODEL", "from-chat-env"),
            ("APP__MODEL", "from-app-env"),
            ("CHAT_ENDPOINT", "http://10.0.0.2:8080/v1/chat/completions"),
            ("CHAT_API_KEY", "token"),
        ]),
    )
    .expect("overrides");

    assert_eq!(config.model, "from-app-env");
    assert_eq!(config.endpoint, "http://10.0.0.2:8080/v1/chat/completions");
    assert_eq!(config.api_key.as_deref(), Some("token"));
}

#[test]
fn blank_api_key_override_clears_credential() {
    let mut config = ChatConfig {
        api_key: Some("old".into()),
        ..ChatConfig::default()
    };
    apply_env_overrides(&mut config, lookup_from(&[("CHAT_API_KEY", "  ")])).expect("overrides");
    assert_eq!(config.api_key, None);
}

#[test]
fn invalid_shape_override_is_rejected() {
    let mut config = ChatConfig::default();
    let err = apply_env_overrides(&mut config, lookup_from(&[("CHAT_REQUEST_SHAPE", "stream")]))
        .expect_err("must fail");
    assert!(err.to_string().contains("request shape"), "unexpected error: {err}");
}

#[test]
fn validate_rejects_relative_or_non_http_endpoints() {
    let relative = ChatConfig {
        endpoint: "/api/chat".into(),
        ..ChatConfig::default()
    };
    assert!(relative.validate().is_err());

    let ftp = ChatConfig {
        endpoint: "ftp://example.com/api/chat".into(),
        ..ChatConfig::default()
    };
    assert!(ftp.validate().is_err());

    let no_model = ChatConfig {
        model: "  ".into(),
        ..ChatConfig::default()
    };
    assert!(no_model.validate().is_err());
}

#[test]
fn reads_config_from_explicit_path() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("chat_core_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("chat.toml");
    fs::write(&path, "model = \"mistral\"\ngreeting = \"Hello!\"\n").expect("write");

    let config = read_config_file(&path).expect("read");
    assert_eq!(config.model, "mistral");
    assert_eq!(config.greeting, "Hello!");

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let err = read_config_file(Path::new("/nonexistent/chat.toml")).expect_err("must fail");
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn layered_load_defers_validation_to_the_caller() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("chat_core_layered_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("chat.toml");
    fs::write(&path, "endpoint = \"not a url\"\nmodel = \"mistral\"\n").expect("write");

    assert!(load_config(Some(&path)).is_err());

    let mut config = load_layered(Some(&path)).expect("layered");
    assert_eq!(config.model, "mistral");
    assert!(config.validate().is_err());
    config.endpoint = "http://127.0.0.1:11434/api/chat".into();
    config.validate().expect("flag override fixes endpoint");

    fs::remove_dir_all(temp_root).expect("cleanup");
}
