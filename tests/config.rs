//! Integration tests for configuration loading.

#![allow(unsafe_code)]
#![allow(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::fs;

use mixlayer::{
    MixerError,
    config::{Config, LogLevel},
    mixer::{BackendRegistry, BackendType, Context, State},
};
use tempfile::TempDir;

fn write_config(temp_dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

mod loading {
    use super::*;

    #[test]
    fn loads_every_section_from_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
[general]
log_level = "debug"

[backend]
backend_type = "alsa"
server_address = "unix:/run/sound"

[app]
name = "Volume Panel"
id = "org.example.Panel"
"#,
        );

        let config = Config::load(&path).unwrap();

        assert_eq!(config.general.log_level, LogLevel::Debug);
        assert_eq!(config.backend.backend_type, BackendType::Alsa);
        assert_eq!(
            config.backend.server_address.as_deref(),
            Some("unix:/run/sound")
        );
        assert_eq!(config.app.name.as_deref(), Some("Volume Panel"));
        assert!(config.app.version.is_none());
    }

    #[test]
    fn missing_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");

        let err = Config::load(&path).unwrap_err();

        match err {
            MixerError::IoError { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected IoError, got {other:?}"),
        }
    }

    #[test]
    fn malformed_file_names_location() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "[backend\nbackend_type = 3");

        let err = Config::load(&path).unwrap_err();

        match err {
            MixerError::TomlParseError { location, .. } => {
                assert!(location.ends_with("config.toml"));
            }
            other => panic!("expected TomlParseError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_backend_type_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "[backend]\nbackend_type = \"jack\"\n");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_or_default_follows_config_home() {
        let temp = TempDir::new().unwrap();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", temp.path());
        }

        let defaults = Config::load_or_default().unwrap();
        assert_eq!(defaults, Config::default());

        let config_dir = temp.path().join("mixlayer");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("config.toml"),
            "[general]\nlog_level = \"trace\"\n",
        )
        .unwrap();

        let loaded = Config::load_or_default().unwrap();
        assert_eq!(loaded.general.log_level, LogLevel::Trace);
    }
}

mod applying {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn configured_context_carries_settings() {
        let config = Config::parse(
            r#"
[backend]
backend_type = "null"
server_address = "tcp:localhost"

[app]
name = "Panel"
"#,
            None,
        )
        .unwrap();
        let mut context = Context::new(Arc::new(BackendRegistry::with_builtin()));

        context.configure(&config).unwrap();

        assert_eq!(context.requested_backend_type(), BackendType::Null);
        assert_eq!(context.server_address(), Some("tcp:localhost"));
        assert_eq!(context.app_info().name.as_deref(), Some("Panel"));

        context.open().unwrap();
        assert_eq!(context.state(), State::Ready);
        assert_eq!(context.backend_type(), BackendType::Null);
    }
}
