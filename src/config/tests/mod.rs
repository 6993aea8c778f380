//! Unit tests for config module
//!
//! Tests configuration types, defaults, and serialization.
//! No filesystem dependencies - all in-memory.

use crate::{
    MixerError,
    config::{Config, LogLevel},
    mixer::BackendType,
};

#[test]
fn config_default_auto_detects_backend() {
    let config = Config::default();

    assert_eq!(config.backend.backend_type, BackendType::Unknown);
    assert!(config.backend.server_address.is_none());
    assert!(config.app.is_empty());
}

#[test]
fn config_empty_toml() {
    let config = Config::parse("", None).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn config_deserialize_toml() {
    let toml_str = r#"
        [general]
        log_level = "debug"

        [backend]
        backend_type = "pulseaudio"
        server_address = "tcp:mixer.local"

        [app]
        name = "Volume Panel"
        id = "org.example.VolumePanel"
    "#;

    let config = Config::parse(toml_str, None).unwrap();

    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert_eq!(config.backend.backend_type, BackendType::PulseAudio);
    assert_eq!(config.backend.server_address.as_deref(), Some("tcp:mixer.local"));
    assert_eq!(config.app.name.as_deref(), Some("Volume Panel"));
    assert!(config.app.icon.is_none());
}

#[test]
fn config_serialize_roundtrip() {
    let mut original = Config::default();
    original.backend.backend_type = BackendType::Alsa;

    let toml_str = toml::to_string(&original).unwrap();
    assert!(toml_str.contains("backend_type = \"alsa\""));

    let deserialized = Config::parse(&toml_str, None).unwrap();
    assert_eq!(original, deserialized);
}

#[test]
fn config_rejects_unknown_backend_name() {
    let result = Config::parse("[backend]\nbackend_type = \"jack\"\n", None);

    assert!(matches!(result, Err(MixerError::TomlParseError { .. })));
}

#[test]
fn config_rejects_blank_server_address() {
    let result = Config::parse("[backend]\nserver_address = \"  \"\n", None);

    assert!(matches!(
        result,
        Err(MixerError::InvalidConfigField { ref field, .. }) if field == "server_address"
    ));
}

#[test]
fn json_schema_lists_sections() {
    let schema = Config::json_schema().unwrap();

    assert!(schema.contains("backend_type"));
    assert!(schema.contains("log_level"));
}
