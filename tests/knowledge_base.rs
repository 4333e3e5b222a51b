//! Knowledge Base Search Integration Tests

mod common;

use std::sync::Arc;

use common::*;
use lexllm::adapters::{LexDbConnector, SearchMethod, SearchQuery};
use lexllm::core::{keys, Orchestrator, WorkflowStep};
use lexllm::domain::{ArticleId, ErrorData, EventKind, LexArticle, WorkflowRunRequest};
use lexllm::tools::KnowledgeBaseSearchStep;
use lexllm::workflows::prompts::ALPHA_V1_DEFERRAL_MESSAGE;
use lexllm::workflows::BETA_V1_WORKFLOW;

fn search_run(db: &Arc<FakeLexDb>, step: impl FnOnce(LexDbConnector) -> KnowledgeBaseSearchStep) -> Orchestrator {
    let step: Arc<dyn WorkflowStep> = Arc::new(step(LexDbConnector::new(db.clone())));
    Orchestrator::new(WorkflowRunRequest::new("conv-1", "  Hvad er Rundetårn?  "), vec![step])
}

fn retrieved(run: &Orchestrator) -> Vec<LexArticle> {
    run.context().get_as(keys::RETRIEVED_DOCS).unwrap().unwrap()
}

#[tokio::test]
async fn test_search_writes_docs_and_emits_nothing() {
    let db = Arc::new(FakeLexDb::with_hits(&[rundetaarn(), christian_4()]));
    let mut run = search_run(&db, |c| KnowledgeBaseSearchStep::new(c, "e5_small"));

    let events = run_events(&mut run).await;

    assert_eq!(
        kinds(&events),
        vec![
            EventKind::StreamStart,
            EventKind::WorkflowStep,
            EventKind::WorkflowStep,
            EventKind::StreamEnd,
        ]
    );
    assert_eq!(retrieved(&run), vec![rundetaarn(), christian_4()]);
    assert!(db.lookups.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_parameters_are_passed_through() {
    let db = Arc::new(FakeLexDb::with_hits(&[rundetaarn(), christian_4(), tycho_brahe()]));
    let mut run = search_run(&db, |c| {
        KnowledgeBaseSearchStep::new(c, "openai_large_3_sections")
            .with_method(SearchMethod::HybridSearch)
            .with_top_k(2)
            .with_rrf_k(60)
    });

    run_events(&mut run).await;

    let searches = db.searches.lock().unwrap().clone();
    assert_eq!(
        searches,
        vec![(
            "hybrid_search".to_string(),
            "openai_large_3_sections".to_string(),
            SearchQuery::new("Hvad er Rundetårn?", 2).with_rrf_k(60),
        )]
    );
    assert_eq!(retrieved(&run).len(), 2);
}

#[tokio::test]
async fn test_chunk_hits_resolve_to_parent_articles_in_rank_order() {
    let hits = vec![chunk_hit(501, 2), chunk_hit(502, 1), chunk_hit(503, 2)];
    let db = Arc::new(
        FakeLexDb::new(SearchBehavior::Hits(hits)).with_articles(&[rundetaarn(), christian_4()]),
    );
    let mut run = search_run(&db, |c| {
        KnowledgeBaseSearchStep::new(c, "e5_small").with_method(SearchMethod::HydeSearch)
    });

    run_events(&mut run).await;

    assert_eq!(retrieved(&run), vec![christian_4(), rundetaarn()]);
    assert_eq!(
        db.lookups.lock().unwrap().clone(),
        vec![vec![ArticleId::Int(2), ArticleId::Int(1)]]
    );
    assert_eq!(db.searches.lock().unwrap()[0].0, "hyde_search");
}

#[tokio::test]
async fn test_unreachable_knowledge_base_leads_to_deferral() {
    let provider = Arc::new(ScriptedProvider::new());
    let connector = LexDbConnector::new(Arc::new(FakeLexDb::new(SearchBehavior::Unreachable)));
    let workflow = BETA_V1_WORKFLOW.build(connector, provider.clone());
    let mut run = workflow.orchestrator(WorkflowRunRequest::new("conv-1", "Hvad er Rundetårn?"));

    let events = run_events(&mut run).await;

    assert!(retrieved(&run).is_empty());
    assert_eq!(texts(&events), vec![ALPHA_V1_DEFERRAL_MESSAGE.to_string()]);
    assert_eq!(events.last().unwrap().event, EventKind::StreamEnd);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_service_error_fails_the_step() {
    let db = Arc::new(FakeLexDb::new(SearchBehavior::Status(404)));
    let mut run = search_run(&db, |c| KnowledgeBaseSearchStep::new(c, "missing_index"));

    let events = run_events(&mut run).await;

    let last = events.last().unwrap();
    assert_eq!(last.event, EventKind::Error);
    let error: ErrorData = serde_json::from_value(last.data.clone().unwrap()).unwrap();
    assert_eq!(error.code.as_deref(), Some("step_failed"));
    assert!(error.message.contains("Knowledge Base Search"));
    assert!(error.message.contains("missing_index"));
    assert!(error.message.contains("HTTP 404"));
    assert!(!run.context().contains_key(keys::RETRIEVED_DOCS));
}
