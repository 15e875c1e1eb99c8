// canteen-server/src/pipelines/status_pipeline.rs

//! Staff-driven status changes: advance (to ready) and reject.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{OrderStatus, PaymentMethod};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{AdvanceStatusCtxData, RejectOrderCtxData};
use crate::services::PushMessage;
use orderflow::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

const MAX_REASON_CHARS: usize = 500;

pub fn register_status_pipelines(registry: &Registry<AppError>) {
  register_advance_status_pipeline(registry);
  register_reject_order_pipeline(registry);
}

fn register_advance_status_pipeline(registry: &Registry<AppError>) {
  let not_ready: SkipCondition<AdvanceStatusCtxData> =
    Arc::new(|ctx_data: ContextData<AdvanceStatusCtxData>| ctx_data.read().change.target != OrderStatus::Ready);

  let mut pipeline = Pipeline::<AdvanceStatusCtxData, AppError>::new(&[
    ("load_order", false, None),
    ("check_transition", false, None),
    ("persist_status", false, None),
    ("notify_ready", true, Some(not_ready)),
  ]);

  pipeline.on_root("load_order", common_steps::load_order::<AdvanceStatusCtxData>);
  // Rejection refunds and records a reason, so it has its own pipeline.
  pipeline.before_root("check_transition", |ctx_data: ContextData<AdvanceStatusCtxData>| {
    Box::pin(async move {
      if ctx_data.read().change.target == OrderStatus::Rejected {
        return Err(AppError::Validation("Use the reject-order route to reject an order.".to_string()));
      }
      Ok(PipelineControl::Continue)
    })
  });
  pipeline.on_root("check_transition", common_steps::check_transition::<AdvanceStatusCtxData>);
  pipeline.on_root("persist_status", persist_status);
  pipeline.on_root("notify_ready", notify_ready);

  registry.register_pipeline(pipeline);
  tracing::info!("Advance-status pipeline registered.");
}

fn register_reject_order_pipeline(registry: &Registry<AppError>) {
  let not_wallet: SkipCondition<RejectOrderCtxData> = Arc::new(|ctx_data: ContextData<RejectOrderCtxData>| {
    ctx_data
      .read()
      .change
      .order
      .as_ref()
      .map_or(true, |o| o.payment_method != PaymentMethod::Wallet)
  });

  let mut pipeline = Pipeline::<RejectOrderCtxData, AppError>::new(&[
    ("load_order", false, None),
    ("check_transition", false, None),
    ("refund_wallet", false, Some(not_wallet)),
    ("mark_rejected", false, None),
    ("notify_rejection", true, None),
  ]);

  pipeline.before_root("load_order", |ctx_data: ContextData<RejectOrderCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let reason = guard.reason.trim().to_string();
      if reason.is_empty() {
        return Err(AppError::Validation("سبب الرفض مطلوب.".to_string()));
      }
      if reason.chars().count() > MAX_REASON_CHARS {
        return Err(AppError::Validation(format!(
          "Rejection reason is limited to {} characters.",
          MAX_REASON_CHARS
        )));
      }
      guard.reason = reason;
      Ok(PipelineControl::Continue)
    })
  });
  pipeline.on_root("load_order", common_steps::load_order::<RejectOrderCtxData>);
  pipeline.on_root("check_transition", common_steps::check_transition::<RejectOrderCtxData>);
  pipeline.on_root("refund_wallet", refund_wallet);
  pipeline.on_root("mark_rejected", mark_rejected);
  pipeline.on_root("notify_rejection", notify_rejection);

  registry.register_pipeline(pipeline);
  tracing::info!("Reject-order pipeline registered.");
}

#[instrument(name = "status::persist_status", skip_all, err(Display))]
async fn persist_status(ctx_data: ContextData<AdvanceStatusCtxData>) -> AppResult<PipelineControl> {
  let (store, display_id, from, to) = {
    let guard = ctx_data.read();
    let current = guard
      .change
      .order
      .as_ref()
      .map(|o| o.status)
      .ok_or_else(|| AppError::Internal("persist_status before load_order".to_string()))?;
    (guard.app_state.store.clone(), guard.change.display_id, current, guard.change.target)
  };
  if !store.update_order_status(display_id, from, to).await? {
    warn!(display_id, "Order status changed while being advanced.");
    return Err(AppError::Validation(format!(
      "Order #{} was updated by someone else; refresh and try again.",
      display_id
    )));
  }
  info!(display_id, status = to.as_str(), "Order status updated.");
  if let Some(order) = ctx_data.write().change.order.as_mut() {
    order.status = to;
  }
  Ok(PipelineControl::Continue)
}

async fn notify_ready(ctx_data: ContextData<AdvanceStatusCtxData>) -> AppResult<PipelineControl> {
  let (app_state, user_id, display_id) = {
    let guard = ctx_data.read();
    let user_id = guard.change.order.as_ref().map(|o| o.user_id);
    (guard.app_state.clone(), user_id, guard.change.display_id)
  };
  let Some(user_id) = user_id else {
    return Ok(PipelineControl::Continue);
  };
  let message = PushMessage::order_ready(display_id, &app_state.config.push.icon_url);
  let report = common_steps::send_notification(&app_state, user_id, &message).await;
  ctx_data.write().notification = report;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "status::refund_wallet", skip_all, err(Display))]
async fn refund_wallet(ctx_data: ContextData<RejectOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, user_id, amount) = {
    let guard = ctx_data.read();
    let order = guard
      .change
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("refund before load_order".to_string()))?;
    (guard.app_state.store.clone(), order.user_id, order.total_cents)
  };
  let balance = store.credit_wallet(user_id, amount).await?;
  info!(%user_id, amount_cents = amount, balance, "Wallet refunded.");
  ctx_data.write().refunded_cents = Some(amount);
  Ok(PipelineControl::Continue)
}

/// Takes a refund back when the rejection itself could not be recorded.
async fn reverse_refund(ctx_data: &ContextData<RejectOrderCtxData>) {
  let (store, user_id, refunded) = {
    let guard = ctx_data.read();
    (
      guard.app_state.store.clone(),
      guard.change.order.as_ref().map(|o| o.user_id),
      guard.refunded_cents,
    )
  };
  let (Some(user_id), Some(amount)) = (user_id, refunded) else {
    return;
  };
  match store.debit_wallet(user_id, amount).await {
    Ok(Some(_)) => {
      info!(%user_id, amount_cents = amount, "Refund reversed.");
      ctx_data.write().refunded_cents = None;
    }
    Ok(None) => error!(%user_id, amount_cents = amount, "Refund could not be reversed: balance already spent."),
    Err(e) => error!(%user_id, amount_cents = amount, error = %e, "Refund could not be reversed."),
  }
}

#[instrument(name = "status::mark_rejected", skip_all, err(Display))]
async fn mark_rejected(ctx_data: ContextData<RejectOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, display_id, reason) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.change.display_id, guard.reason.clone())
  };

  // A card callback may land after load_order, so the method comes from the update itself.
  let payment_method = match store.mark_rejected(display_id, &reason).await {
    Ok(Some(method)) => method,
    Ok(None) => {
      warn!(display_id, "Order left the rejectable states while being rejected.");
      reverse_refund(&ctx_data).await;
      return Err(AppError::Validation(format!(
        "Order #{} was updated by someone else; refresh and try again.",
        display_id
      )));
    }
    Err(e) => {
      reverse_refund(&ctx_data).await;
      return Err(e);
    }
  };

  let paid_by_card = payment_method == PaymentMethod::Card;
  if paid_by_card {
    warn!(display_id, "Rejected a paid card order; reverse the payment in the gateway dashboard.");
  }
  info!(display_id, "Order rejected.");
  let mut guard = ctx_data.write();
  guard.card_reversal_required = paid_by_card;
  if let Some(order) = guard.change.order.as_mut() {
    order.status = OrderStatus::Rejected;
    order.payment_method = payment_method;
    order.notes = Some(reason);
  }
  Ok(PipelineControl::Continue)
}

async fn notify_rejection(ctx_data: ContextData<RejectOrderCtxData>) -> AppResult<PipelineControl> {
  let (app_state, user_id, display_id, reason) = {
    let guard = ctx_data.read();
    (
      guard.app_state.clone(),
      guard.change.order.as_ref().map(|o| o.user_id),
      guard.change.display_id,
      guard.reason.clone(),
    )
  };
  let Some(user_id) = user_id else {
    return Ok(PipelineControl::Continue);
  };
  let message = PushMessage::order_rejected(display_id, &reason, &app_state.config.push.icon_url);
  let report = common_steps::send_notification(&app_state, user_id, &message).await;
  ctx_data.write().notification = report;
  Ok(PipelineControl::Continue)
}
