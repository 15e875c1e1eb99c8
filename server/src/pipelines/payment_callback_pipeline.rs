// canteen-server/src/pipelines/payment_callback_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::lifecycle::CallbackOutcome;
use crate::models::{OrderStatus, PaymentMethod};
use crate::pipelines::contexts::PaymentCallbackCtxData;
use crate::services::paymob::{self, CallbackFacts};
use orderflow::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Registers the gateway callback pipeline. Every "do nothing" outcome is a
/// `Stop` with the reason recorded; errors are left to the caller to swallow.
pub fn register_payment_callback_pipeline(registry: &Registry<AppError>) {
  let no_secret: SkipCondition<PaymentCallbackCtxData> =
    Arc::new(|ctx_data: ContextData<PaymentCallbackCtxData>| ctx_data.read().app_state.config.paymob.hmac_secret.is_none());

  let mut pipeline = Pipeline::<PaymentCallbackCtxData, AppError>::new(&[
    ("verify_callback_signature", false, Some(no_secret)),
    ("inspect_callback_outcome", false, None),
    ("confirm_card_order", false, None),
  ]);

  pipeline.on_root("verify_callback_signature", verify_callback_signature);
  pipeline.on_root("inspect_callback_outcome", inspect_callback_outcome);
  pipeline.on_root("confirm_card_order", confirm_card_order);

  registry.register_pipeline(pipeline);
  tracing::info!("Payment callback pipeline registered.");
}

fn ignore(ctx_data: &ContextData<PaymentCallbackCtxData>, reason: &str) -> PipelineControl {
  warn!(reason, "Payment callback ignored.");
  ctx_data.write().outcome = Some(CallbackOutcome::Ignored(reason.to_string()));
  PipelineControl::Stop
}

async fn verify_callback_signature(ctx_data: ContextData<PaymentCallbackCtxData>) -> AppResult<PipelineControl> {
  let verified = {
    let guard = ctx_data.read();
    let secret = guard
      .app_state
      .config
      .paymob
      .hmac_secret
      .as_deref()
      .ok_or_else(|| AppError::Internal("signature check without a secret".to_string()))?;
    match guard.signature.as_deref() {
      Some(provided) => Some(paymob::verify_callback_hmac(secret, &guard.payload, provided)?),
      None => None,
    }
  };
  match verified {
    Some(true) => Ok(PipelineControl::Continue),
    Some(false) => Ok(ignore(&ctx_data, "signature mismatch")),
    None => Ok(ignore(&ctx_data, "missing signature")),
  }
}

async fn inspect_callback_outcome(ctx_data: ContextData<PaymentCallbackCtxData>) -> AppResult<PipelineControl> {
  let facts = CallbackFacts::from_payload(&ctx_data.read().payload);
  ctx_data.write().facts = Some(facts.clone());
  if !facts.success {
    return Ok(ignore(&ctx_data, "payment not successful"));
  }
  if facts.merchant_order_id.is_none() {
    return Ok(ignore(&ctx_data, "missing merchant order reference"));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment_callback::confirm_card_order", skip_all, err(Display))]
async fn confirm_card_order(ctx_data: ContextData<PaymentCallbackCtxData>) -> AppResult<PipelineControl> {
  let (store, facts) = {
    let guard = ctx_data.read();
    let facts = guard
      .facts
      .clone()
      .ok_or_else(|| AppError::Internal("confirmation before inspection".to_string()))?;
    (guard.app_state.store.clone(), facts)
  };
  let display_id = facts
    .merchant_order_id
    .ok_or_else(|| AppError::Internal("confirmation without merchant reference".to_string()))?;

  let Some(order) = store.order_by_display_id(display_id).await? else {
    return Ok(ignore(&ctx_data, "unknown order"));
  };

  if let (Some(stored), Some(reported)) = (order.external_payment_id.as_deref(), facts.gateway_order_id) {
    if stored != reported.to_string() {
      warn!(display_id, stored, reported, "Gateway order id does not match the stored one.");
      return Ok(ignore(&ctx_data, "gateway order mismatch"));
    }
  }

  let outcome = match order.payment_method {
    PaymentMethod::Wallet => return Ok(ignore(&ctx_data, "not a card order")),
    PaymentMethod::Card => CallbackOutcome::AlreadyConfirmed { display_id },
    PaymentMethod::CardPending => {
      if store.confirm_card_payment(display_id).await? {
        if order.status == OrderStatus::Rejected {
          warn!(display_id, "Payment confirmed for a rejected order; reverse it in the gateway dashboard.");
        }
        info!(display_id, "Card payment confirmed.");
        CallbackOutcome::Confirmed { display_id }
      } else {
        CallbackOutcome::AlreadyConfirmed { display_id }
      }
    }
  };
  ctx_data.write().outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}
