// tests/pipeline_execution_tests.rs
mod common;

use common::*;
use orderflow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, SkipCondition};
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  reset_counters();
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[
    ("validate", false, None),
    ("price", false, None),
    ("persist", false, None),
  ]);
  pipeline.on_root("validate", recording_handler("validate", 0));
  pipeline.on_root("price", recording_handler("price", 4000));
  pipeline.on_root("persist", recording_handler("persist", 0));

  let ctx = ContextData::new(TicketContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.total_cents, 4000);
  assert_eq!(guard.trail, vec!["validate", "price", "persist"]);
  assert_eq!(HANDLER_EXEC_COUNTER.load(Ordering::SeqCst), 3);
}

#[tokio::test]
#[serial]
async fn stop_signal_halts_remaining_steps() {
  setup_tracing();
  reset_counters();
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[
    ("check", false, None),
    ("gate", false, None),
    ("charge", false, None),
  ]);
  pipeline.on_root("check", recording_handler("check", 0));
  pipeline.on_root("gate", |ctx: ContextData<TicketContext>| {
    Box::pin(async move {
      ctx.write().trail.push("gate".to_string());
      Ok::<_, FlowError>(PipelineControl::Stop)
    })
  });
  pipeline.on_root("charge", recording_handler("charge", 999));

  let ctx = ContextData::new(TicketContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().trail, vec!["check", "gate"]);
  assert_eq!(ctx.read().total_cents, 0);
}

#[tokio::test]
#[serial]
async fn first_handler_error_aborts_run() {
  setup_tracing();
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[
    ("ok", false, None),
    ("broken", false, None),
    ("never", false, None),
  ]);
  pipeline.on_root("ok", recording_handler("ok", 100));
  pipeline.on_root("broken", failing_handler("broken", "store unreachable"));
  pipeline.on_root("never", recording_handler("never", 100));

  let ctx = ContextData::new(TicketContext::default());
  let err = pipeline.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("store unreachable".to_string()));
  assert_eq!(ctx.read().trail, vec!["ok", "broken"]);
  assert_eq!(ctx.read().total_cents, 100);
}

#[tokio::test]
#[serial]
async fn skip_condition_is_evaluated_against_current_context() {
  setup_tracing();
  let already_priced: SkipCondition<TicketContext> =
    Arc::new(|ctx: ContextData<TicketContext>| ctx.read().total_cents > 0);
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[
    ("price", false, None),
    ("refund", false, Some(already_priced)),
    ("notify", false, None),
  ]);
  pipeline.on_root("price", recording_handler("price", 250));
  pipeline.on_root("refund", recording_handler("refund", -250));
  pipeline.on_root("notify", recording_handler("notify", 0));

  let ctx = ContextData::new(TicketContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().trail, vec!["price", "notify"]);
  assert_eq!(ctx.read().total_cents, 250);
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TicketContext, TestError>::new(&[("price", false, None), ("notify", true, None)]);
  pipeline.on_root("price", recording_handler("price", 10));

  let ctx = ContextData::new(TicketContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().trail, vec!["price"]);
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[("charge", false, None)]);
  pipeline.after_root("charge", recording_handler("after", 0));
  pipeline.on_root("charge", recording_handler("on", 0));
  pipeline.before_root("charge", recording_handler("before", 0));

  let ctx = ContextData::new(TicketContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["before", "on", "after"]);
}

#[tokio::test]
#[serial]
async fn stop_in_before_phase_skips_on_handlers() {
  setup_tracing();
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[("charge", false, None)]);
  pipeline.before_root("charge", recording_handler("guard", 0));
  pipeline.on_root("charge", recording_handler("on", 500));

  let ctx = ContextData::new(TicketContext {
    stop_at: Some("guard".to_string()),
    ..Default::default()
  });
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().trail, vec!["guard"]);
  assert_eq!(ctx.read().total_cents, 0);
}

#[tokio::test]
#[serial]
async fn structural_edits_change_execution() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TicketContext, TestError>::new(&[("validate", false, None), ("persist", false, None)]);
  pipeline.insert_after_step("validate", "price", false, None);
  pipeline.insert_before_step("validate", "audit", true, None);
  assert_eq!(pipeline.step_names(), vec!["audit", "validate", "price", "persist"]);

  pipeline.on_root("validate", recording_handler("validate", 0));
  pipeline.on_root("price", recording_handler("price", 75));
  pipeline.on_root("persist", recording_handler("persist", 0));
  pipeline.remove_step("persist");
  pipeline.remove_step("does_not_exist");

  let ctx = ContextData::new(TicketContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["validate", "price"]);
}

#[tokio::test]
#[serial]
async fn set_optional_and_skip_condition_after_construction() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TicketContext, TestError>::new(&[("price", false, None), ("notify", false, None)]);
  pipeline.on_root("price", recording_handler("price", 1));
  pipeline.set_optional("notify", true);
  let always: SkipCondition<TicketContext> = Arc::new(|_ctx: ContextData<TicketContext>| true);
  pipeline.set_skip_condition("price", Some(always));

  let ctx = ContextData::new(TicketContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert!(ctx.read().trail.is_empty());
}

#[test]
#[should_panic(expected = "not defined")]
fn registering_on_unknown_step_panics() {
  let mut pipeline = Pipeline::<TicketContext, TestError>::new(&[("price", false, None)]);
  pipeline.on_root("prcie", recording_handler("typo", 0));
}
