// canteen-server/src/pipelines/common_steps.rs

//! Steps registered in more than one pipeline. Each is generic over the
//! context trait it needs, and is handed to `on_root` as a plain fn item.

use crate::errors::{AppError, Result as AppResult};
use crate::models::order::{self, Transition};
use crate::pipelines::contexts::{CheckoutCtx, StatusChangeCtx};
use crate::services::{DispatchReport, PushMessage};
use crate::state::AppState;
use orderflow::{ContextData, PipelineControl};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Checks cart limits and records the total.
pub async fn validate_cart<T: CheckoutCtx>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let total_cents = order::validate_lines(ctx_data.read().items())?;
  debug!(total_cents, "Cart validated.");
  ctx_data.write().set_total_cents(total_cents);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "common_step::allocate_display_id", skip_all, err(Display))]
pub async fn allocate_display_id<T: CheckoutCtx>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let store = ctx_data.read().app_state().store.clone();
  let display_id = store
    .next_display_id()
    .await
    .map_err(|e| AppError::IdAllocation(e.to_string()))?;
  info!(display_id, "Display id allocated.");
  ctx_data.write().set_display_id(display_id);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "common_step::load_order", skip_all, err(Display))]
pub async fn load_order<T: StatusChangeCtx>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (store, display_id) = {
    let guard = ctx_data.read();
    (guard.app_state().store.clone(), guard.change().display_id)
  };
  let found = store
    .order_by_display_id(display_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order #{} not found.", display_id)))?;
  ctx_data.write().change_mut().order = Some(found);
  Ok(PipelineControl::Continue)
}

/// Stops the pipeline when the order already has the target status.
pub async fn check_transition<T: StatusChangeCtx>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (current, target) = {
    let guard = ctx_data.read();
    let change = guard.change();
    let current = change
      .order
      .as_ref()
      .map(|o| o.status)
      .ok_or_else(|| AppError::Internal("check_transition ran before load_order".to_string()))?;
    (current, change.target)
  };
  match order::check_transition(current, target)? {
    Transition::Apply => Ok(PipelineControl::Continue),
    Transition::Unchanged => {
      info!(status = target.as_str(), "Order already has the requested status.");
      ctx_data.write().change_mut().unchanged = true;
      Ok(PipelineControl::Stop)
    }
  }
}

/// Sends a push message, logging instead of failing. Notification steps are
/// best effort.
pub async fn send_notification(app_state: &AppState, user_id: Uuid, message: &PushMessage) -> Option<DispatchReport> {
  match app_state.notifier.notify(user_id, message).await {
    Ok(report) => Some(report),
    Err(e) => {
      warn!(%user_id, error = %e, "Notification could not be dispatched.");
      None
    }
  }
}
