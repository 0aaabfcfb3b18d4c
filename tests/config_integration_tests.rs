//! Integration tests for ConfigManager and settings file handling
//!
//! These tests verify:
//! - Default settings when no file exists
//! - Loading a hand-written settings file
//! - Environment variable overrides
//! - Error reporting for malformed files

use camino::Utf8PathBuf;
use model_demo::{ConfigManager, Settings};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

/// Manager with an environment prefix no other test touches
fn manager_with_prefix(config_path: &Utf8PathBuf, prefix: &str) -> ConfigManager {
    ConfigManager::new(config_path)
        .unwrap()
        .with_env_prefix(prefix)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(manager.settings_path(), config_path.join("settings.yaml"));
}

#[test]
fn test_creates_missing_config_dir() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("Model Demo Data");

    ConfigManager::new(&nested).unwrap();

    assert!(nested.is_dir());
}

#[test]
fn test_load_default_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = manager_with_prefix(&config_path, "MODEL_DEMO_IT_DEFAULTS");

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings, Settings::default());
}

#[test]
fn test_load_handwritten_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join("settings.yaml"),
        r#"
output_dir: renders
force_cpu: true
text_to_image:
  steps: 25
  guidance_scale: 9.0
  height: 512
  width: 512
text_classification:
  max_length: 128
"#,
    )
    .unwrap();
    let manager = manager_with_prefix(&config_path, "MODEL_DEMO_IT_FILE");

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.output_dir, "renders");
    assert!(settings.force_cpu);
    assert_eq!(settings.text_to_image.steps, 25);
    assert_eq!(settings.text_to_image.guidance_scale, 9.0);
    assert_eq!(settings.text_to_image.height, Some(512));
    assert_eq!(settings.text_classification.max_length, 128);
    // Untouched keys keep their defaults
    assert_eq!(
        settings.text_classification.model_id,
        "distilbert-base-uncased-finetuned-sst-2-english"
    );
    assert_eq!(settings.log_dir, "logs");
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join("settings.yaml"),
        "output_dir: from_file\ntext_to_image:\n  steps: 25\n",
    )
    .unwrap();

    // Safety: these variable names are unique to this test
    unsafe {
        std::env::set_var("MODEL_DEMO_IT_ENV_OUTPUT_DIR", "from_env");
        std::env::set_var("MODEL_DEMO_IT_ENV_TEXT_TO_IMAGE__STEPS", "10");
    }
    let manager = manager_with_prefix(&config_path, "MODEL_DEMO_IT_ENV");

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.output_dir, "from_env");
    assert_eq!(settings.text_to_image.steps, 10);

    unsafe {
        std::env::remove_var("MODEL_DEMO_IT_ENV_OUTPUT_DIR");
        std::env::remove_var("MODEL_DEMO_IT_ENV_TEXT_TO_IMAGE__STEPS");
    }
}

#[test]
fn test_malformed_settings_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join("settings.yaml"),
        "text_to_image:\n  steps: many\n",
    )
    .unwrap();
    let manager = manager_with_prefix(&config_path, "MODEL_DEMO_IT_BAD");

    let err = manager.load_settings().unwrap_err();

    assert!(format!("{:#}", err).contains("settings.yaml"));
}

#[test]
fn test_save_then_load_preserves_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = manager_with_prefix(&config_path, "MODEL_DEMO_IT_SAVE");

    let mut settings = Settings::default();
    settings.debug_mode = true;
    settings.text_to_image.sliced_attention_size = Some(2);
    settings.text_classification.tokenizer_id = "custom/tokenizer".to_string();
    manager.save_settings(&settings).unwrap();

    let contents = fs::read_to_string(manager.settings_path()).unwrap();
    assert!(contents.contains("debug_mode: true"));

    assert_eq!(manager.load_settings().unwrap(), settings);
}
