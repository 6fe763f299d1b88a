//! Configuration loading and construction-time validation

use aiia_pipeline::config::{BackendKind, MetadataMode, PipelineConfig, GEMINI_KEY_ENV_VARS};
use aiia_pipeline::{ConfigError, WorkflowOrchestrator};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

/// Clears every variable the loader consults
fn clear_env() {
    for name in GEMINI_KEY_ENV_VARS {
        std::env::remove_var(name);
    }
    std::env::remove_var("AIIA_CONFIG");
}

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn offline_config() -> PipelineConfig {
    PipelineConfig {
        iqa_metric: "heuristic".to_string(),
        ..Default::default()
    }
}

#[test]
#[serial]
fn toml_file_overrides_defaults() {
    clear_env();
    let file = toml_file(
        r#"
quality_threshold = 0.25
backends = ["ollama", "gemini"]
persona = "street_photographer"
metadata_mode = "embedded"

[gemini]
api_key = "from-toml"
model = "gemini-1.5-pro"
"#,
    );

    let config = PipelineConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.quality_threshold, 0.25);
    assert_eq!(config.backends, vec![BackendKind::Ollama, BackendKind::Gemini]);
    assert_eq!(config.metadata_mode, MetadataMode::Embedded);
    assert_eq!(config.gemini.api_key.as_deref(), Some("from-toml"));
    assert_eq!(config.gemini.model, "gemini-1.5-pro");
    assert_eq!(config.ollama.model, PipelineConfig::default().ollama.model);
}

#[test]
#[serial]
fn environment_key_beats_toml_key() {
    clear_env();
    std::env::set_var("AIIA_GEMINI_API_KEY", "from-env");
    let file = toml_file("[gemini]\napi_key = \"from-toml\"\n");

    let config = PipelineConfig::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.gemini.api_key.as_deref(), Some("from-env"));
}

#[test]
#[serial]
fn google_api_key_is_secondary_source() {
    clear_env();
    std::env::set_var("GOOGLE_API_KEY", "google-key");

    let config = PipelineConfig::load(None).unwrap();
    clear_env();

    assert_eq!(config.gemini.api_key.as_deref(), Some("google-key"));
}

#[test]
#[serial]
fn whitespace_env_key_falls_through_to_toml() {
    clear_env();
    std::env::set_var("AIIA_GEMINI_API_KEY", "   ");
    let file = toml_file("[gemini]\napi_key = \"from-toml\"\n");

    let config = PipelineConfig::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.gemini.api_key.as_deref(), Some("from-toml"));
}

#[test]
#[serial]
fn config_path_from_environment() {
    clear_env();
    let file = toml_file("quality_threshold = 0.5\nrecursive = false\n");
    std::env::set_var("AIIA_CONFIG", file.path());

    let config = PipelineConfig::load(None).unwrap();
    clear_env();

    assert_eq!(config.quality_threshold, 0.5);
    assert!(!config.recursive);
}

#[test]
#[serial]
fn gemini_without_key_fails_construction() {
    clear_env();
    let config = PipelineConfig {
        backends: vec![BackendKind::Gemini],
        ..offline_config()
    };

    let result = WorkflowOrchestrator::new(config);
    assert!(matches!(result, Err(ConfigError::MissingApiKey { .. })));
}

#[test]
fn unknown_persona_fails_construction() {
    let config = PipelineConfig {
        persona: "astronaut".to_string(),
        ..offline_config()
    };

    match WorkflowOrchestrator::new(config) {
        Err(ConfigError::UnknownPersona(name)) => assert_eq!(name, "astronaut"),
        other => panic!("expected unknown persona, got {:?}", other.err()),
    }
}

#[test]
fn threshold_outside_range_fails_construction() {
    for threshold in [0.0, -0.2, 1.5] {
        let config = PipelineConfig {
            quality_threshold: threshold,
            ..offline_config()
        };
        assert!(matches!(
            WorkflowOrchestrator::new(config),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }
}

#[test]
fn embedded_mode_without_exiftool_fails_construction() {
    let config = PipelineConfig {
        metadata_mode: MetadataMode::Embedded,
        exiftool_path: "/nonexistent/exiftool".to_string(),
        ..offline_config()
    };

    assert!(matches!(
        WorkflowOrchestrator::new(config),
        Err(ConfigError::MetadataToolUnavailable(_))
    ));
}

#[test]
fn sidecar_defaults_construct_offline() {
    let orchestrator = WorkflowOrchestrator::new(offline_config()).unwrap();
    assert_eq!(orchestrator.ai_model(), "ollama:llava:13b");
}
