// canteen-server/src/pipelines/wallet_order_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderStatus, PaymentMethod};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::WalletOrderCtxData;
use chrono::Utc;
use orderflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{error, info, instrument, warn};

/// Registers the wallet checkout pipeline.
///
/// The debit is a conditional decrement, so two concurrent orders can never
/// take the balance below zero. A failed insert after the debit is
/// compensated with a credit of the same amount.
pub fn register_wallet_order_pipeline(registry: &Registry<AppError>) {
  let mut pipeline = Pipeline::<WalletOrderCtxData, AppError>::new(&[
    ("validate_cart", false, None),
    ("check_wallet_balance", false, None),
    ("allocate_display_id", false, None),
    ("debit_wallet", false, None),
    ("insert_wallet_order", false, None),
  ]);

  pipeline.on_root("validate_cart", common_steps::validate_cart::<WalletOrderCtxData>);
  pipeline.on_root("check_wallet_balance", check_wallet_balance);
  pipeline.on_root("allocate_display_id", common_steps::allocate_display_id::<WalletOrderCtxData>);
  pipeline.on_root("debit_wallet", debit_wallet);
  pipeline.on_root("insert_wallet_order", insert_wallet_order);

  registry.register_pipeline(pipeline);
  tracing::info!("Wallet order pipeline registered.");
}

/// Fails early, before an id is allocated, when the balance is short.
async fn check_wallet_balance(ctx_data: ContextData<WalletOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, user_id, total_cents) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.user_id, guard.total_cents)
  };
  let balance = store
    .wallet_balance(user_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Wallet not found.".to_string()))?;
  if balance < total_cents {
    warn!(balance, total_cents, "Wallet balance too low for order.");
    return Err(AppError::InsufficientFunds);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "wallet_order::debit_wallet", skip_all, err(Display))]
async fn debit_wallet(ctx_data: ContextData<WalletOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, user_id, total_cents) = {
    let guard = ctx_data.read();
    (guard.app_state.store.clone(), guard.user_id, guard.total_cents)
  };
  // The balance may have moved since the check; the store re-checks atomically.
  let balance_after = store
    .debit_wallet(user_id, total_cents)
    .await?
    .ok_or(AppError::InsufficientFunds)?;
  info!(total_cents, balance_after, "Wallet debited.");
  ctx_data.write().balance_after_cents = Some(balance_after);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "wallet_order::insert_wallet_order", skip_all, err(Display))]
async fn insert_wallet_order(ctx_data: ContextData<WalletOrderCtxData>) -> AppResult<PipelineControl> {
  let (store, new_order) = {
    let guard = ctx_data.read();
    let display_id = guard
      .display_id
      .ok_or_else(|| AppError::Internal("order insert without display id".to_string()))?;
    let new_order = Order {
      display_id,
      external_payment_id: None,
      user_id: guard.user_id,
      items: guard.items.clone(),
      total_cents: guard.total_cents,
      payment_method: PaymentMethod::Wallet,
      status: OrderStatus::Preparing,
      notes: guard.notes.clone(),
      created_at: Utc::now(),
    };
    (guard.app_state.store.clone(), new_order)
  };

  if let Err(insert_err) = store.insert_order(&new_order).await {
    error!(display_id = new_order.display_id, error = %insert_err, "Order insert failed after debit, crediting back.");
    match store.credit_wallet(new_order.user_id, new_order.total_cents).await {
      Ok(balance) => {
        info!(balance, "Debit compensated.");
        ctx_data.write().balance_after_cents = Some(balance);
      }
      Err(credit_err) => error!(
        user_id = %new_order.user_id,
        amount_cents = new_order.total_cents,
        error = %credit_err,
        "Compensating credit failed; wallet needs manual correction."
      ),
    }
    return Err(insert_err);
  }

  info!(display_id = new_order.display_id, "Wallet order created.");
  ctx_data.write().order = Some(new_order);
  Ok(PipelineControl::Continue)
}
