// canteen-server/src/lifecycle.rs

//! The order lifecycle facade. Each operation builds a context, runs the
//! pipeline registered for it and turns the final context into a result.

use crate::errors::{AppError, Result};
use crate::models::{Cents, OrderLine, OrderStatus};
use crate::pipelines::contexts::{
  AdvanceStatusCtxData, CardPaymentCtxData, PaymentCallbackCtxData, RejectOrderCtxData, StatusChange,
  WalletOrderCtxData,
};
use crate::services::DispatchReport;
use crate::state::AppState;
use orderflow::{ContextData, PipelineResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletOrderReceipt {
  pub display_id: i64,
  pub total_cents: Cents,
  pub balance_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCheckout {
  pub display_id: i64,
  pub redirect_url: String,
}

/// What a gateway callback did. The webhook answers 200 for all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
  Confirmed { display_id: i64 },
  AlreadyConfirmed { display_id: i64 },
  Ignored(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
  pub display_id: i64,
  pub status: OrderStatus,
  /// False when the order already had the requested status.
  pub changed: bool,
  #[serde(skip_serializing_if = "Option::is_none", with = "crate::models::money::decimal_opt")]
  pub refunded: Option<Cents>,
  /// A card payment was captured for a rejected order and must be reversed
  /// by staff at the gateway.
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub card_reversal_required: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notification: Option<DispatchReport>,
}

impl StatusUpdate {
  fn from_change(change: &StatusChange, refunded: Option<Cents>, notification: Option<DispatchReport>) -> Self {
    let status = match (&change.order, change.unchanged) {
      (Some(order), true) => order.status,
      _ => change.target,
    };
    Self {
      display_id: change.display_id,
      status,
      changed: !change.unchanged,
      refunded,
      card_reversal_required: false,
      notification,
    }
  }
}

#[derive(Clone)]
pub struct OrderLifecycle {
  state: AppState,
}

impl OrderLifecycle {
  pub fn new(state: AppState) -> Self {
    Self { state }
  }

  #[instrument(name = "lifecycle::place_wallet_order", skip(self, items, notes), fields(lines = items.len()), err(Display))]
  pub async fn place_wallet_order(
    &self,
    user_id: Uuid,
    items: Vec<OrderLine>,
    notes: Option<String>,
  ) -> Result<WalletOrderReceipt> {
    let ctx_data = ContextData::new(WalletOrderCtxData::new(self.state.clone(), user_id, items, notes));
    self.run_to_completion(ctx_data.clone()).await?;

    let guard = ctx_data.read();
    let display_id = guard
      .display_id
      .ok_or_else(|| AppError::Internal("wallet order completed without a display id".to_string()))?;
    let balance_cents = guard
      .balance_after_cents
      .ok_or_else(|| AppError::Internal("wallet order completed without a balance".to_string()))?;
    Ok(WalletOrderReceipt {
      display_id,
      total_cents: guard.total_cents,
      balance_cents,
    })
  }

  #[instrument(name = "lifecycle::start_card_payment", skip(self, items), fields(lines = items.len()), err(Display))]
  pub async fn start_card_payment(&self, user_id: Uuid, items: Vec<OrderLine>) -> Result<CardCheckout> {
    let ctx_data = ContextData::new(CardPaymentCtxData::new(self.state.clone(), user_id, items));
    self.run_to_completion(ctx_data.clone()).await?;

    let guard = ctx_data.read();
    match (guard.display_id, guard.redirect_url.clone()) {
      (Some(display_id), Some(redirect_url)) => Ok(CardCheckout {
        display_id,
        redirect_url,
      }),
      _ => Err(AppError::Internal("card payment completed without a checkout url".to_string())),
    }
  }

  /// Never fails: internal errors are logged and reported as `Ignored`.
  #[instrument(name = "lifecycle::confirm_payment_callback", skip_all)]
  pub async fn confirm_payment_callback(&self, payload: Value, signature: Option<String>) -> CallbackOutcome {
    let ctx_data = ContextData::new(PaymentCallbackCtxData::new(self.state.clone(), payload, signature));
    let outcome = match self.state.registry.run(ctx_data.clone()).await {
      Ok(_) => ctx_data
        .read()
        .outcome
        .clone()
        .unwrap_or_else(|| CallbackOutcome::Ignored("no outcome recorded".to_string())),
      Err(e) => {
        error!(error = %e, "Payment callback processing failed.");
        CallbackOutcome::Ignored(format!("processing failed: {}", e))
      }
    };
    info!(outcome = ?outcome, "Payment callback handled.");
    outcome
  }

  #[instrument(name = "lifecycle::advance_status", skip(self), err(Display))]
  pub async fn advance_status(&self, display_id: i64, target: OrderStatus) -> Result<StatusUpdate> {
    let ctx_data = ContextData::new(AdvanceStatusCtxData::new(self.state.clone(), display_id, target));
    let result = self.state.registry.run(ctx_data.clone()).await?;

    let guard = ctx_data.read();
    Self::check_status_result(result, &guard.change)?;
    Ok(StatusUpdate::from_change(&guard.change, None, guard.notification))
  }

  #[instrument(name = "lifecycle::reject_order", skip(self, reason), err(Display))]
  pub async fn reject_order(&self, display_id: i64, reason: String) -> Result<StatusUpdate> {
    let ctx_data = ContextData::new(RejectOrderCtxData::new(self.state.clone(), display_id, reason));
    let result = self.state.registry.run(ctx_data.clone()).await?;

    let guard = ctx_data.read();
    Self::check_status_result(result, &guard.change)?;
    let mut update = StatusUpdate::from_change(&guard.change, guard.refunded_cents, guard.notification);
    update.card_reversal_required = guard.card_reversal_required;
    Ok(update)
  }

  /// Status pipelines may only stop for an order that already has the target.
  fn check_status_result(result: PipelineResult, change: &StatusChange) -> Result<()> {
    match result {
      PipelineResult::Completed => Ok(()),
      PipelineResult::Stopped if change.unchanged => Ok(()),
      PipelineResult::Stopped => {
        warn!(display_id = change.display_id, "Status pipeline stopped unexpectedly.");
        Err(AppError::PipelineHaltedByHandler)
      }
    }
  }

  async fn run_to_completion<T>(&self, ctx_data: ContextData<T>) -> Result<()>
  where
    T: Send + Sync + 'static,
  {
    match self.state.registry.run(ctx_data).await? {
      PipelineResult::Completed => Ok(()),
      PipelineResult::Stopped => Err(AppError::PipelineHaltedByHandler),
    }
  }
}
