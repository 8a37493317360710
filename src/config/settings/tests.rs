use super::*;
use tempfile::TempDir;
use serial_test::serial;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.api_key_env, "HUGGINGFACE_API_KEY");
    assert_eq!(config.embedding.dimension, 1536);
    assert_eq!(config.generation.api_key_env, "GROQ_API_KEY");
    assert_eq!(config.generation.models.len(), 4);
    assert_eq!(config.generation.models[1], "llama3-70b-8192");
    assert_eq!(config.generation.answer_max_tokens, 1500);
    assert_eq!(config.generation.summary_max_tokens, 2000);
    assert_eq!(config.chunking.max_length, 100);
    assert_eq!(config.chunking.overlap_words, 90);
    assert_eq!(config.retrieval.primary_top_k, 50);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.embedding.endpoint = "ftp://example.com/embed".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.embedding.dimension = 8;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.models = Vec::new();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::NoModels)
    ));

    let mut invalid_config = config.clone();
    invalid_config.generation.models.push("  ".to_string());
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.generation.top_p = 0.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.max_length = 5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.retrieval.high_relevance_count = 40;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::HighRelevanceExceedsLimit(40, 30))
    ));
}

#[test]
fn generation_url() {
    let config = Config::default();
    let url = config
        .generation
        .base_url()
        .expect("should parse generation url");
    assert_eq!(url.host_str(), Some("api.groq.com"));
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let mut parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    parsed_config.base_dir = config.base_dir.clone();
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [generation]
        models = ["only-model"]
    "#;
    let parsed: Config = toml::from_str(toml_str).expect("should parse partial config");
    assert_eq!(parsed.generation.models, vec!["only-model".to_string()]);
    assert_eq!(parsed.generation.api_key_env, "GROQ_API_KEY");
    assert_eq!(parsed.embedding, EmbeddingConfig::default());
    assert_eq!(parsed.retrieval, RetrievalConfig::default());
}

#[test]
fn setter_validation() {
    let mut embedding = EmbeddingConfig::default();
    assert!(
        embedding
            .set_endpoint("http://localhost:8080/embed".to_string())
            .is_ok()
    );
    assert!(embedding.set_dimension(768).is_ok());
    assert!(embedding.set_api_key_env("EMBED_KEY".to_string()).is_ok());

    assert!(embedding.set_endpoint("not a url".to_string()).is_err());
    assert!(embedding.set_dimension(0).is_err());
    assert!(embedding.set_api_key_env(String::new()).is_err());
    assert_eq!(embedding.dimension, 768);

    let mut generation = GenerationConfig::default();
    assert!(
        generation
            .set_models(vec!["a".to_string(), "b".to_string()])
            .is_ok()
    );
    assert!(generation.set_models(Vec::new()).is_err());
    assert!(generation.set_base_url("gopher://x".to_string()).is_err());
    assert_eq!(generation.models.len(), 2);
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.embedding, EmbeddingConfig::default());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.generation.models = vec!["first".to_string(), "second".to_string()];
    config.retrieval.max_keywords = 2;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load saved config");
    assert_eq!(loaded, config);
    assert_eq!(loaded.database_path(), temp_dir.path().join("metadata.db"));
    assert_eq!(loaded.vector_database_path(), temp_dir.path().join("vectors"));
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding]\ndimension = 3\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn api_keys_come_from_the_environment() {
    let config = EmbeddingConfig {
        api_key_env: "DOC_QA_TEST_EMBEDDING_KEY".to_string(),
        ..EmbeddingConfig::default()
    };

    // SAFETY: serialized with every other test that touches the environment
    unsafe { env::remove_var("DOC_QA_TEST_EMBEDDING_KEY") };
    assert_eq!(config.api_key(), None);

    // SAFETY: as above
    unsafe { env::set_var("DOC_QA_TEST_EMBEDDING_KEY", "  hf_secret \n") };
    assert_eq!(config.api_key().as_deref(), Some("hf_secret"));

    // SAFETY: as above
    unsafe { env::set_var("DOC_QA_TEST_EMBEDDING_KEY", "   ") };
    assert_eq!(config.api_key(), None);

    // SAFETY: as above
    unsafe { env::remove_var("DOC_QA_TEST_EMBEDDING_KEY") };
}
