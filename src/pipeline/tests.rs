use std::sync::Mutex;

use chrono::NaiveDate;
use tempfile::TempDir;

use super::*;
use crate::embeddings::chunking::{ChunkMetadata, ChunkType};
use crate::indexer::IngestionJob;
use crate::records::Severity;
use crate::test_support::{KeywordEmbedder, ScriptedModel, hydraulic_record, overheating_record};

const QUESTION: &str = "truck running hot under load";

async fn ingested_index(embedder: Arc<KeywordEmbedder>) -> (Arc<VectorIndex>, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = VectorIndex::open(
        &temp_dir.path().join("vectors"),
        "maintenance_logs",
        KeywordEmbedder::dimension(),
    )
    .await
    .expect("should open vector index");

    let mut job = IngestionJob::new(embedder, index);
    job.run(&[overheating_record("ML-1"), hydraulic_record("ML-2")])
        .await
        .expect("should ingest");

    (Arc::new(job.into_index()), temp_dir)
}

fn scripted(responses: &[&str]) -> Arc<ScriptedModel> {
    Arc::new(ScriptedModel::new(
        responses.iter().map(|r| Ok((*r).to_string())).collect(),
    ))
}

fn pipeline(
    embedder: Arc<KeywordEmbedder>,
    llm: Arc<ScriptedModel>,
    index: Arc<VectorIndex>,
) -> Pipeline {
    Pipeline::new(embedder, llm, index, PipelineConfig::default())
}

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<Stage>>,
    completed: Mutex<Vec<(Stage, Option<Stage>)>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn started(&self) -> Vec<Stage> {
        self.started.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn completed(&self) -> Vec<(Stage, Option<Stage>)> {
        self.completed.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn failures(&self) -> Vec<String> {
        self.failures.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl PipelineObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage) {
        if let Ok(mut started) = self.started.lock() {
            started.push(stage);
        }
    }

    fn stage_completed(&self, stage: Stage, state: &PipelineState, _elapsed: Duration) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push((stage, state.last_completed()));
        }
    }

    fn run_failed(&self, error: &PipelineError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(error.to_string());
        }
    }
}

#[tokio::test]
async fn full_run_produces_every_stage_output() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = scripted(&[
        "heavy truck engine overheating coolant temperature under load",
        "Fault pattern: thermostat failure",
        "Check the thermostat first; overheating under load is usually a stuck thermostat.",
    ]);
    let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&llm), index);

    let run = pipeline.run(QUESTION).await.expect("should complete run");

    assert_eq!(run.original_query, QUESTION);
    assert_eq!(
        run.rewritten_query,
        "heavy truck engine overheating coolant temperature under load"
    );
    assert_eq!(run.retrieval_query, run.rewritten_query);
    assert_eq!(run.knowledge_analysis, "Fault pattern: thermostat failure");
    assert!(run.final_response.contains("overheating"));
    assert_eq!(run.retrieved_chunks.len(), 8);
    assert_eq!(run.retrieved_chunks[0].metadata.record_id, "ML-1");
    for pair in run.retrieved_chunks.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    let stages: Vec<Stage> = run.timings.iter().map(|t| t.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());
}

#[tokio::test]
async fn stages_receive_the_right_inputs() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = scripted(&["overheating truck", "ANALYSIS-TEXT", "final"]);
    let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&llm), index);

    pipeline.run(QUESTION).await.expect("should complete run");

    let prompts = llm.recorded_prompts();
    assert_eq!(prompts.len(), 3);

    let (rewrite, rewrite_tokens) = &prompts[0];
    assert!(rewrite.contains(&format!("\"{QUESTION}\"")));
    assert_eq!(*rewrite_tokens, 256);

    let (extraction, extraction_tokens) = &prompts[1];
    assert!(extraction.contains("QUERY: overheating truck"));
    assert!(extraction.contains("--- Chunk 1 (type: "));
    assert!(extraction.contains("--- Chunk 8 (type: "));
    assert_eq!(*extraction_tokens, 2048);

    let (synthesis, _) = &prompts[2];
    assert!(synthesis.contains(&format!("The junior engineer asked: \"{QUESTION}\"")));
    assert!(synthesis.contains("ANALYSIS-TEXT"));

    let calls = embedder.recorded_calls();
    assert_eq!(
        calls.last().expect("retrieval should embed the query"),
        &vec!["overheating truck".to_string()]
    );
}

#[tokio::test]
async fn blank_rewrite_falls_back_to_original_question() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = scripted(&["   \n", "analysis", "response"]);
    let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&llm), index);

    let run = pipeline.run(QUESTION).await.expect("should complete run");

    assert_eq!(run.rewritten_query, "");
    assert_eq!(run.retrieval_query, QUESTION);
    assert_eq!(
        embedder.recorded_calls().last().map(Vec::as_slice),
        Some([QUESTION.to_string()].as_slice())
    );
    assert!(llm.recorded_prompts()[1].0.contains(&format!("QUERY: {QUESTION}")));
}

#[tokio::test]
async fn extraction_failure_aborts_the_run() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = Arc::new(ScriptedModel::new(vec![
        Ok("overheating truck".to_string()),
        Err(ProviderError::Status {
            service: "anthropic",
            status: 500,
        }),
        Ok("never used".to_string()),
    ]));
    let pipeline = pipeline(embedder, Arc::clone(&llm), index);
    let observer = RecordingObserver::default();

    let err = pipeline
        .run_observed(QUESTION, &observer)
        .await
        .expect_err("extraction failure should abort");

    assert!(matches!(
        err,
        PipelineError::ExtractionFailed(StageFailure::Provider(ProviderError::Status {
            status: 500,
            ..
        }))
    ));
    assert_eq!(err.stage(), Some(Stage::Extract));
    assert_eq!(llm.recorded_prompts().len(), 2);
    assert_eq!(
        observer.started(),
        vec![Stage::Rewrite, Stage::Retrieve, Stage::Extract]
    );
    assert_eq!(
        observer.completed(),
        vec![
            (Stage::Rewrite, Some(Stage::Rewrite)),
            (Stage::Retrieve, Some(Stage::Retrieve)),
        ]
    );
    assert_eq!(observer.failures().len(), 1);
}

#[tokio::test]
async fn rewrite_failure_skips_retrieval() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let calls_after_ingest = embedder.recorded_calls().len();
    let llm = Arc::new(ScriptedModel::new(vec![Err(ProviderError::Transport {
        service: "anthropic",
        message: "connection refused".to_string(),
    })]));
    let pipeline = pipeline(Arc::clone(&embedder), llm, index);

    let err = pipeline.run(QUESTION).await.expect_err("should fail");

    assert!(matches!(err, PipelineError::RewriteFailed(_)));
    assert_eq!(embedder.recorded_calls().len(), calls_after_ingest);
}

#[tokio::test]
async fn missing_collection_is_reported_at_retrieval() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = VectorIndex::open(
        &temp_dir.path().join("vectors"),
        "maintenance_logs",
        KeywordEmbedder::dimension(),
    )
    .await
    .expect("should open vector index");
    let llm = scripted(&["rewritten", "analysis", "response"]);
    let pipeline = pipeline(
        Arc::new(KeywordEmbedder::new()),
        Arc::clone(&llm),
        Arc::new(index),
    );

    let err = pipeline.run(QUESTION).await.expect_err("should fail");

    assert!(matches!(
        &err,
        PipelineError::IndexNotFound { collection } if collection == "maintenance_logs"
    ));
    assert_eq!(err.stage(), Some(Stage::Retrieve));
    assert_eq!(llm.recorded_prompts().len(), 1);
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = scripted(&["unused"]);
    let pipeline = pipeline(embedder, Arc::clone(&llm), index);

    let err = pipeline.run("  \t").await.expect_err("should fail");

    assert!(matches!(err, PipelineError::EmptyQuery));
    assert_eq!(err.stage(), None);
    assert!(llm.recorded_prompts().is_empty());
}

#[tokio::test]
async fn top_k_limits_retrieved_chunks() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = scripted(&["overheating truck", "analysis", "response"]);
    let settings = PipelineConfig {
        top_k: 3,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(embedder, llm, index, settings);

    let run = pipeline.run(QUESTION).await.expect("should complete run");

    assert_eq!(run.retrieved_chunks.len(), 3);
}

#[tokio::test]
async fn filter_restricts_retrieval() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let llm = scripted(&["overheating truck", "analysis", "response"]);
    let pipeline = pipeline(embedder, llm, index).with_filter(QueryFilter {
        severity: Some(Severity::Medium),
        ..QueryFilter::default()
    });

    let run = pipeline.run(QUESTION).await.expect("should complete run");

    assert_eq!(run.retrieved_chunks.len(), 4);
    assert!(
        run.retrieved_chunks
            .iter()
            .all(|c| c.metadata.record_id == "ML-2")
    );
}

struct StalledModel;

#[async_trait::async_trait]
impl LanguageModel for StalledModel {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }

    fn model_name(&self) -> &str {
        "stalled"
    }
}

#[tokio::test]
async fn slow_stage_times_out() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let pipeline = Pipeline::new(
        embedder,
        Arc::new(StalledModel),
        index,
        PipelineConfig::default(),
    )
    .with_stage_timeout(Duration::from_millis(50));

    let err = pipeline.run(QUESTION).await.expect_err("should time out");

    assert!(matches!(
        err,
        PipelineError::RewriteFailed(StageFailure::TimedOut(_))
    ));
}

#[tokio::test]
async fn concurrent_runs_are_independent() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let (index, _temp_dir) = ingested_index(Arc::clone(&embedder)).await;
    let first = pipeline(
        Arc::clone(&embedder),
        scripted(&["hydraulic hose leak", "a1", "r1"]),
        Arc::clone(&index),
    );
    let second = pipeline(
        Arc::clone(&embedder),
        scripted(&["coolant overheating truck", "a2", "r2"]),
        index,
    );

    let (a, b) = tokio::join!(first.run("fluid on the ground"), second.run(QUESTION));
    let a = a.expect("first run should complete");
    let b = b.expect("second run should complete");

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.final_response, "r1");
    assert_eq!(b.final_response, "r2");
    assert_eq!(a.retrieved_chunks[0].metadata.record_id, "ML-2");
    assert_eq!(b.retrieved_chunks[0].metadata.record_id, "ML-1");
}

fn retrieved(id: &str, chunk_type: ChunkType, distance: f32, text: &str) -> RetrievedChunk {
    RetrievedChunk {
        id: id.to_string(),
        text: text.to_string(),
        metadata: ChunkMetadata {
            record_id: "ML-1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 14).unwrap_or_default(),
            equipment_id: "TRK-412".to_string(),
            equipment_type: "Heavy Utility Truck".to_string(),
            severity: Severity::High,
            repair_time_hours: 6.5,
            chunk_type,
        },
        distance,
    }
}

#[test]
fn chunk_blocks_carry_metadata_and_distance() {
    let chunks = vec![
        retrieved("ML-1_resolution", ChunkType::Resolution, 0.123_456, "Fix it."),
        retrieved("ML-1_diagnostic", ChunkType::Diagnostic, 0.5, "Check it."),
    ];

    let formatted = prompts::format_chunks(&chunks);

    assert_eq!(
        formatted,
        "\n--- Chunk 1 (type: resolution, equipment: Heavy Utility Truck, severity: high, distance: 0.1235) ---\nFix it.\n\
         \n--- Chunk 2 (type: diagnostic, equipment: Heavy Utility Truck, severity: high, distance: 0.5000) ---\nCheck it.\n"
    );
}

#[test]
fn no_chunks_formats_as_empty() {
    assert_eq!(prompts::format_chunks(&[]), "");
    assert!(prompts::extraction_prompt("q", &[]).contains("RETRIEVED MAINTENANCE DATA:\n\n"));
}

#[test]
fn effective_query_prefers_non_blank_rewrite() {
    let mut state = PipelineState::new("original");
    assert_eq!(state.effective_query(), "original");

    state.set_rewritten_query("rewritten".to_string());
    assert_eq!(state.effective_query(), "rewritten");

    let mut blank = PipelineState::new("original");
    blank.set_rewritten_query("  ".to_string());
    assert_eq!(blank.effective_query(), "original");
    assert_eq!(blank.last_completed(), Some(Stage::Rewrite));
}
