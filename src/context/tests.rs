use super::*;
use crate::KbError;
use crate::config::ConfigError;
use crate::test_support::{KeywordEmbedder, ScriptedModel, overheating_record};
use tempfile::TempDir;

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.ollama.embedding_dimension = KeywordEmbedder::dimension() as u32;
    config.index.upsert_batch_size = 2;
    config
}

#[tokio::test]
async fn index_lives_under_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);

    let index = open_index(&config).await.expect("should open index");

    assert_eq!(index.path(), temp_dir.path().join("vectors"));
    assert_eq!(index.table_name(), "maintenance_logs");
    assert_eq!(index.dimension(), KeywordEmbedder::dimension());
    assert!(!index.exists().await.expect("should list tables"));
}

#[tokio::test]
async fn connect_requires_api_key() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = test_config(&temp_dir);
    config.llm.api_key_env = "MAINTENANCE_KB_TEST_UNSET_KEY".to_string();

    let err = Services::connect(config)
        .await
        .expect_err("missing key should fail");

    assert!(matches!(
        err,
        KbError::Config(ConfigError::MissingApiKey(name)) if name == "MAINTENANCE_KB_TEST_UNSET_KEY"
    ));
}

#[tokio::test]
async fn pipeline_shares_the_context_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let embedder = Arc::new(KeywordEmbedder::new());

    let mut index = open_index(&config).await.expect("should open index");
    let chunks = crate::embeddings::chunk_record(&overheating_record("ML-1"))
        .expect("should chunk")
        .to_vec();
    let vectors: Vec<Vec<f32>> = chunks
        .iter()
        .map(|c| KeywordEmbedder::embed_text(&c.text))
        .collect();
    index.upsert(&chunks, &vectors).await.expect("should upsert");

    let llm = Arc::new(ScriptedModel::new(vec![
        Ok("coolant overheating".to_string()),
        Ok("analysis".to_string()),
        Ok("response".to_string()),
    ]));
    let services = Services::with_adapters(config, embedder, llm, Arc::new(index));

    assert_eq!(services.index().count().await.expect("should count"), 4);

    let run = services
        .pipeline()
        .run("engine running hot")
        .await
        .expect("should complete run");
    assert_eq!(run.retrieved_chunks.len(), 4);
    assert_eq!(run.final_response, "response");
}
