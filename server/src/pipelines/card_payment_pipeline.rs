// canteen-server/src/pipelines/card_payment_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderStatus, PaymentMethod};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::CardPaymentCtxData;
use crate::services::paymob::{BillingData, PaymentKeyRequest};
use chrono::Utc;
use orderflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument};

/// Registers the card checkout pipeline. The order is stored as
/// `card_pending` and only becomes payable food once the gateway confirms.
pub fn register_card_payment_pipeline(registry: &Registry<AppError>) {
  let mut pipeline = Pipeline::<CardPaymentCtxData, AppError>::new(&[
    ("validate_cart", false, None),
    ("allocate_display_id", false, None),
    ("load_customer_profile", false, None),
    ("register_gateway_payment", false, None),
    ("insert_pending_order", false, None),
    ("build_checkout_url", false, None),
  ]);

  pipeline.on_root("validate_cart", common_steps::validate_cart::<CardPaymentCtxData>);
  // The gateway refuses zero-amount orders.
  pipeline.after_root("validate_cart", |ctx_data: ContextData<CardPaymentCtxData>| {
    Box::pin(async move {
      if ctx_data.read().total_cents <= 0 {
        return Err(AppError::Validation("Card payments need a positive total.".to_string()));
      }
      Ok(PipelineControl::Continue)
    })
  });
  pipeline.on_root("allocate_display_id", common_steps::allocate_display_id::<CardPaymentCtxData>);
  pipeline.on_root("load_customer_profile", load_customer_profile);
  pipeline.on_root("register_gateway_payment", register_gateway_payment);
  pipeline.on_root("insert_pending_order", insert_pending_order);
  pipeline.on_root("build_checkout_url", build_checkout_url);

  registry.register_pipeline(pipeline);
  tracing::info!("Card payment pipeline registered.");
}

async fn load_customer_profile(ctx_data: ContextData<CardPaymentCtxData>) -> AppResult<PipelineControl> {
  let (store, user_id) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.user_id)
  };
  let profile = store
    .profile(user_id)
    .await?
    .ok_or_else(|| AppError::NotFound("User profile not found.".to_string()))?;
  ctx_data.write().customer = Some(profile);
  Ok(PipelineControl::Continue)
}

/// authenticate -> register order -> payment key.
#[instrument(name = "card_payment::register_gateway_payment", skip_all, err(Display))]
async fn register_gateway_payment(ctx_data: ContextData<CardPaymentCtxData>) -> AppResult<PipelineControl> {
  let (gateway, display_id, amount_cents, billing) = {
    let guard = ctx_data.read();
    let display_id = guard
      .display_id
      .ok_or_else(|| AppError::Internal("gateway registration without display id".to_string()))?;
    let customer = guard
      .customer
      .as_ref()
      .ok_or_else(|| AppError::Internal("gateway registration without customer".to_string()))?;
    let email = guard.app_state.config.student_email(&customer.student_id);
    (
      guard.app_state.gateway.clone(),
      display_id,
      guard.total_cents,
      BillingData::for_customer(customer, &email),
    )
  };

  let auth_token = gateway.authenticate().await?;
  let gateway_order_id = gateway.register_order(&auth_token, display_id, amount_cents).await?;
  let request = PaymentKeyRequest {
    gateway_order_id,
    amount_cents,
    billing,
  };
  let payment_key = gateway.payment_key(&auth_token, &request).await?;
  info!(display_id, gateway_order_id, "Gateway payment registered.");

  let mut guard = ctx_data.write();
  guard.gateway_order_id = Some(gateway_order_id);
  guard.payment_key = Some(payment_key);
  Ok(PipelineControl::Continue)
}

async fn insert_pending_order(ctx_data: ContextData<CardPaymentCtxData>) -> AppResult<PipelineControl> {
  let (store, pending) = {
    let guard = ctx_data.read();
    let (display_id, gateway_order_id) = match (guard.display_id, guard.gateway_order_id) {
      (Some(d), Some(g)) => (d, g),
      _ => return Err(AppError::Internal("pending order insert before gateway registration".to_string())),
    };
    let pending = Order {
      display_id,
      external_payment_id: Some(gateway_order_id.to_string()),
      user_id: guard.user_id,
      items: guard.items.clone(),
      total_cents: guard.total_cents,
      payment_method: PaymentMethod::CardPending,
      status: OrderStatus::PendingPayment,
      notes: None,
      created_at: Utc::now(),
    };
    (guard.app_state.store.clone(), pending)
  };
  store.insert_order(&pending).await?;
  info!(display_id = pending.display_id, "Card order stored pending payment.");
  ctx_data.write().order = Some(pending);
  Ok(PipelineControl::Continue)
}

async fn build_checkout_url(ctx_data: ContextData<CardPaymentCtxData>) -> AppResult<PipelineControl> {
  let mut guard = ctx_data.write();
  let payment_key = guard
    .payment_key
    .clone()
    .ok_or_else(|| AppError::Internal("checkout url without payment key".to_string()))?;
  let url = guard.app_state.gateway.checkout_url(&payment_key);
  guard.redirect_url = Some(url);
  Ok(PipelineControl::Continue)
}
