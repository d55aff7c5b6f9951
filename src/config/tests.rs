use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let mut original_config = Config::default();
    original_config.ollama.host = "test-host".to_string();
    original_config.ollama.port = 8080;
    original_config.llm.provider = LlmProvider::Ollama;
    original_config.llm.model = "llama3.2:latest".to_string();

    let toml_content =
        render_config(&original_config).expect("config should render to toml successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let content =
        fs::read_to_string(&config_path).expect("should read from config_path successfully");
    let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

    assert_eq!(original_config, loaded_config);
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [ollama
        host = "localhost"
        port = "invalid_port"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn unknown_provider_rejected() {
    let toml_str = r#"
        [llm]
        provider = "carrier-pigeon"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
    assert!(result.is_err());
}

#[test]
fn explicit_config_dir_wins() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");

    let resolved =
        resolve_config_dir(Some(temp_dir.path())).expect("override should always resolve");
    assert_eq!(resolved, temp_dir.path());
}

#[test]
fn rendered_config_lists_every_section() {
    let rendered = render_config(&Config::default()).expect("should render");

    for section in ["[ollama]", "[llm]", "[chunking]", "[retrieval]"] {
        assert!(rendered.contains(section), "missing {section}");
    }
    assert!(rendered.contains("data_dir"));
}

#[test]
fn env_file_in_config_dir_supplies_missing_variables() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join(".env"),
        "KB_COPILOT_ENV_FILE_KEY=from-dotenv\nPATH=should-not-override\n",
    )
    .expect("should write .env");

    let loaded = load_config_env(temp_dir.path());

    assert_eq!(loaded, Some(temp_dir.path().join(".env")));
    assert_eq!(
        std::env::var("KB_COPILOT_ENV_FILE_KEY").as_deref(),
        Ok("from-dotenv")
    );
    assert_ne!(
        std::env::var("PATH").as_deref(),
        Ok("should-not-override")
    );
}

#[test]
fn missing_env_file_is_ignored() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    assert_eq!(load_config_env(temp_dir.path()), None);
}
