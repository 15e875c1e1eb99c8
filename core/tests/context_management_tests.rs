// tests/context_management_tests.rs
mod common;

use common::*;
use orderflow::{ContextData, FlowError, Pipeline, PipelineControl};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn later_steps_see_earlier_writes() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TicketContext, TestError>::new(&[("price", false, None), ("describe", false, None)]);

  pipeline.on_root("price", |ctx: ContextData<TicketContext>| {
    Box::pin(async move {
      ctx.update(|c| c.total_cents = 4000);
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });
  pipeline.on_root("describe", |ctx: ContextData<TicketContext>| {
    Box::pin(async move {
      let total = ctx.with(|c| c.total_cents);
      tokio::task::yield_now().await;
      ctx.write().note = format!("total={}", total);
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(TicketContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().note, "total=4000");
}

#[test]
fn clones_share_the_same_data() {
  let a = ContextData::new(TicketContext::default());
  let b = a.clone();
  b.write().total_cents = 7;
  assert_eq!(a.read().total_cents, 7);

  let fresh: ContextData<TicketContext> = ContextData::default();
  assert_eq!(fresh.read().total_cents, 0);
}
