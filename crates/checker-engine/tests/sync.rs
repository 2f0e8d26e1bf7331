//! Pool sync: coalescing, idempotence, rubric policy and recording.

mod common;

use std::time::Duration;

use checker_core::{
  Error,
  evaluation::{AnswerInput, EvaluationStatus, EvaluatorType, SummaryInput},
  rubric::question_texts,
  store::EvaluationStore,
};
use checker_engine::{EngineConfig, RecordRequest, SyncDriver, SyncRequest};
use common::*;

fn request(pool: &str, skip_evaluation: bool) -> SyncRequest {
  SyncRequest { chain_id: CHAIN, allo_pool_id: pool.into(), skip_evaluation }
}

fn human(application: &str, summary: &str, codes: &[i64]) -> RecordRequest {
  RecordRequest {
    pool:                key("1"),
    allo_application_id: application.into(),
    evaluator:           "0xabc".into(),
    evaluator_type:      EvaluatorType::Human,
    cid:                 "cid".into(),
    summary:             SummaryInput {
      questions: codes
        .iter()
        .enumerate()
        .map(|(i, c)| AnswerInput { question_index: i as u32, answer_enum: *c })
        .collect(),
      summary:   summary.into(),
    },
    evaluation_status:   None,
  }
}

// ─── Coalescing ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_syncs_share_one_run() {
  let indexer = FakeIndexer::with_delay(vec![round("1", 5)], Duration::from_millis(50));
  let engine = engine(indexer, FakeBackend::new()).await;
  let driver = SyncDriver::new(engine.clone());

  let (a, b) = tokio::join!(
    driver.sync(request("1", false)),
    driver.sync(request("1", false)),
  );

  assert_eq!(a.unwrap(), b.unwrap());
  assert_eq!(engine.indexer().fetches(), 1);
  assert_eq!(engine.reasoner().backend().rubric_calls(), 1);
  assert_eq!(engine.reasoner().backend().evaluation_calls(), 5);
}

#[tokio::test]
async fn repeated_sync_within_window_reuses_the_result() {
  let engine = engine(FakeIndexer::new(vec![round("1", 2)]), FakeBackend::new()).await;
  let driver = SyncDriver::new(engine.clone());

  let first = driver.sync(request("1", true)).await.unwrap();
  let second = driver.sync(request("1", true)).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(engine.indexer().fetches(), 1);
}

#[tokio::test]
async fn failed_sync_is_shared_and_held_for_the_window() {
  let indexer = FakeIndexer::with_delay(vec![], Duration::from_millis(20));
  let short = EngineConfig { sync_window: Duration::from_millis(300), ..config() };
  let engine = engine_with(indexer, FakeBackend::new(), short).await;
  let driver = SyncDriver::new(engine.clone());

  let (a, b) = tokio::join!(
    driver.sync(request("missing", false)),
    driver.sync(request("missing", false)),
  );

  assert!(matches!(a.as_ref().map_err(|e| &**e), Err(Error::NotFound(_))));
  assert!(matches!(b.as_ref().map_err(|e| &**e), Err(Error::NotFound(_))));
  assert_eq!(engine.indexer().fetches(), 1);

  let retry = driver.sync(request("missing", false)).await;
  assert!(matches!(retry.as_ref().map_err(|e| &**e), Err(Error::NotFound(_))));
  assert_eq!(engine.indexer().fetches(), 1);

  tokio::time::sleep(Duration::from_millis(350)).await;
  let _ = driver.sync(request("missing", false)).await;
  assert_eq!(engine.indexer().fetches(), 2);
}

#[tokio::test]
async fn mixed_evaluation_flags_share_one_fetch() {
  let indexer = FakeIndexer::with_delay(vec![round("1", 5)], Duration::from_millis(50));
  let engine = engine(indexer, FakeBackend::new()).await;
  let driver = SyncDriver::new(engine.clone());

  let (full, skip) = tokio::join!(
    driver.sync(request("1", false)),
    driver.sync(request("1", true)),
  );
  let (full, skip) = (full.unwrap(), skip.unwrap());

  assert_eq!(engine.indexer().fetches(), 1);
  assert_eq!(engine.reasoner().backend().rubric_calls(), 1);
  assert_eq!(engine.reasoner().backend().evaluation_calls(), 5);
  assert_eq!(full.pool_id, skip.pool_id);
  assert!(!full.evaluations_skipped);
  assert!(full.is_complete());
  assert!(skip.evaluations_skipped);
}

#[tokio::test]
async fn full_sync_after_a_skipped_one_still_evaluates() {
  let engine = engine(FakeIndexer::new(vec![round("1", 4)]), FakeBackend::new()).await;
  let driver = SyncDriver::new(engine.clone());

  driver.sync(request("1", true)).await.unwrap();
  let full = driver.sync(request("1", false)).await.unwrap();

  assert_eq!(engine.indexer().fetches(), 1);
  assert!(!full.evaluations_skipped);
  assert!(full.is_complete());
  assert_eq!(engine.reasoner().backend().evaluation_calls(), 4);

  let pending = engine
    .store()
    .applications_without_evaluation(full.pool_id, EvaluatorType::Llm)
    .await
    .unwrap();
  assert!(pending.is_empty());
}

#[tokio::test]
async fn abandoned_sync_does_not_block_other_pools() {
  let engine = engine(
    FakeIndexer::new(vec![round("1", 10), round("2", 2)]),
    FakeBackend::new().delay(Duration::from_millis(200)),
  )
  .await;
  let driver = SyncDriver::new(engine.clone());

  let dropped =
    tokio::time::timeout(Duration::from_millis(300), driver.sync(request("1", false))).await;
  assert!(dropped.is_err());

  let other = tokio::time::timeout(Duration::from_secs(3), driver.sync(request("2", false)))
    .await
    .expect("pool 2 syncs while pool 1's caller is gone")
    .unwrap();
  assert!(other.is_complete());

  // The abandoned run kept going and is joined rather than restarted.
  let first = tokio::time::timeout(Duration::from_secs(3), driver.sync(request("1", false)))
    .await
    .expect("pool 1 finishes")
    .unwrap();
  assert!(first.is_complete());
  assert_eq!(engine.indexer().fetches(), 2);
  assert_eq!(engine.reasoner().backend().evaluation_calls(), 12);
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn resync_creates_no_duplicates() {
  let engine = engine(FakeIndexer::new(vec![round("1", 6)]), FakeBackend::new()).await;

  let first = engine.sync_pool(request("1", true)).await.unwrap();
  let second = engine.sync_pool(request("1", true)).await.unwrap();

  assert_eq!(first.created_applications, 6);
  assert_eq!(second.created_applications, 0);
  assert_eq!(first.pool_id, second.pool_id);
  assert!(second.evaluations_skipped);

  assert_eq!(engine.store().list_pools().await.unwrap().len(), 1);
  assert_eq!(engine.store().list_applications(first.pool_id).await.unwrap().len(), 6);
  assert_eq!(engine.reasoner().backend().evaluation_calls(), 0);
}

#[tokio::test]
async fn unknown_pool_is_not_found() {
  let engine = engine(FakeIndexer::new(vec![]), FakeBackend::new()).await;
  let result = engine.sync_pool(request("404", false)).await;
  assert!(matches!(result, Err(Error::NotFound(_))));
  assert!(engine.store().list_pools().await.unwrap().is_empty());
}

// ─── Rubric ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stored_rubric_is_reused() {
  let engine = engine(FakeIndexer::new(vec![round("1", 1)]), FakeBackend::new()).await;

  let outcome = engine.sync_pool(request("1", true)).await.unwrap();
  engine.sync_pool(request("1", true)).await.unwrap();

  assert_eq!(engine.reasoner().backend().rubric_calls(), 1);
  let rubric = engine.store().get_rubric(outcome.pool_id).await.unwrap();
  assert_eq!(
    question_texts(&rubric),
    vec!["Generation 1 first?", "Generation 1 second?", "Generation 1 third?"]
  );
}

#[tokio::test]
async fn rubric_generation_retries_until_success() {
  let engine = engine(
    FakeIndexer::new(vec![round("1", 1)]),
    FakeBackend::new().rubric_failures(4),
  )
  .await;

  let outcome = engine.sync_pool(request("1", true)).await.unwrap();

  assert_eq!(engine.reasoner().backend().rubric_calls(), 5);
  let rubric = engine.store().get_rubric(outcome.pool_id).await.unwrap();
  assert_eq!(rubric.len(), 3);
  assert_eq!(rubric[0].question, "Generation 5 first?");
}

#[tokio::test]
async fn rubric_generation_gives_up_after_five_attempts() {
  let engine = engine(
    FakeIndexer::new(vec![round("1", 1)]),
    FakeBackend::new().rubric_failures(5),
  )
  .await;

  let result = engine.sync_pool(request("1", false)).await;

  assert!(matches!(result, Err(Error::Transport(_))));
  assert_eq!(engine.reasoner().backend().rubric_calls(), 5);
  assert_eq!(engine.reasoner().backend().evaluation_calls(), 0);

  // The pool row committed before the failure stays.
  let pool = engine.store().get_pool(key("1")).await.unwrap().unwrap();
  assert!(engine.store().get_rubric(pool.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn recreated_rubric_replaces_questions_and_evaluations() {
  let engine = engine(FakeIndexer::new(vec![round("1", 3)]), FakeBackend::new()).await;
  let outcome = engine.sync_pool(request("1", false)).await.unwrap();
  assert!(outcome.is_complete());

  let questions = engine.recreate_rubric(key("1")).await.unwrap();

  assert_eq!(
    questions,
    vec!["Generation 2 first?", "Generation 2 second?", "Generation 2 third?"]
  );
  let pending = engine
    .store()
    .applications_without_evaluation(outcome.pool_id, EvaluatorType::Llm)
    .await
    .unwrap();
  assert_eq!(pending.len(), 3);
}

#[tokio::test]
async fn recreating_an_unknown_pool_is_not_found() {
  let engine = engine(FakeIndexer::new(vec![round("1", 1)]), FakeBackend::new()).await;
  let result = engine.recreate_rubric(key("1")).await;
  assert!(matches!(result, Err(Error::NotFound(_))));
}

// ─── Recording ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn last_recorded_evaluation_wins() {
  let engine = engine(FakeIndexer::new(vec![round("1", 1)]), FakeBackend::new()).await;
  engine.sync_pool(request("1", true)).await.unwrap();

  engine.record_evaluation(human("app-1", "first", &[1, 1, 1])).await.unwrap();
  engine.record_evaluation(human("app-1", "second", &[2, 2, 2])).await.unwrap();
  let mut last = human("app-1", "third", &[0, 0, 0]);
  last.evaluation_status = Some(EvaluationStatus::Approved);
  let written = engine.record_evaluation(last).await.unwrap();

  let app = engine.store().get_application(key("1"), "app-1".into()).await.unwrap().unwrap();
  let all = engine.store().evaluations_for_application(app.id).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].evaluation.id, written.id);
  assert_eq!(all[0].evaluation.summary, "third");
  assert_eq!(all[0].evaluation.evaluator_score, 100);
  assert_eq!(all[0].evaluation.evaluation_status, EvaluationStatus::Approved);
}

#[tokio::test]
async fn human_status_defaults_to_rejected() {
  let engine = engine(FakeIndexer::new(vec![round("1", 1)]), FakeBackend::new()).await;
  engine.sync_pool(request("1", true)).await.unwrap();

  let written = engine
    .record_evaluation(human("app-1", "all yes", &[0, 0, 0]))
    .await
    .unwrap();

  assert_eq!(written.evaluator_score, 100);
  assert_eq!(written.evaluation_status, EvaluationStatus::Rejected);
}

#[tokio::test]
async fn recording_rejects_bad_input() {
  let engine = engine(FakeIndexer::new(vec![round("1", 1)]), FakeBackend::new()).await;
  engine.sync_pool(request("1", true)).await.unwrap();

  let missing = engine.record_evaluation(human("app-9", "x", &[0])).await;
  assert!(matches!(missing, Err(Error::NotFound(_))));

  let bad_code = engine.record_evaluation(human("app-1", "x", &[0, 3])).await;
  assert!(matches!(bad_code, Err(Error::UnknownAnswerCode(3))));

  let mut repeated = human("app-1", "x", &[0, 1, 2]);
  repeated.summary.questions[2].question_index = 0;
  let repeated = engine.record_evaluation(repeated).await;
  assert!(matches!(repeated, Err(Error::Validation(_))));

  let stale = engine.record_evaluation(human("app-1", "x", &[0, 0, 0, 0])).await;
  assert!(matches!(stale, Err(Error::Store(_))));

  let app = engine.store().get_application(key("1"), "app-1".into()).await.unwrap().unwrap();
  assert!(engine.store().evaluations_for_application(app.id).await.unwrap().is_empty());
}
