// canteen-server/src/pipelines/contexts.rs

//! Data structs the pipelines run against. Handlers receive them wrapped in
//! `orderflow::ContextData`.

use crate::lifecycle::CallbackOutcome;
use crate::models::{Cents, Order, OrderLine, OrderStatus, UserProfile};
use crate::services::{AuthSession, CallbackFacts, DispatchReport, IdentityUser};
use crate::state::AppState;
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone)]
pub struct SignupCtxData {
  pub app_state: AppState,
  pub name: String,
  pub student_id: String,
  pub password: String,
  // Filled by the pipeline:
  pub email: Option<String>,
  pub user: Option<IdentityUser>,
  pub session: Option<AuthSession>,
}

impl SignupCtxData {
  pub fn new(app_state: AppState, name: String, student_id: String, password: String) -> Self {
    Self {
      app_state,
      name,
      student_id,
      password,
      email: None,
      user: None,
      session: None,
    }
  }
}

/// Shared by both checkout tracks so cart validation and id allocation are
/// written once.
pub trait CheckoutCtx: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn items(&self) -> &[OrderLine];
  fn set_total_cents(&mut self, total_cents: Cents);
  fn set_display_id(&mut self, display_id: i64);
}

#[derive(Clone)]
pub struct WalletOrderCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub items: Vec<OrderLine>,
  pub notes: Option<String>,
  pub total_cents: Cents,
  pub display_id: Option<i64>,
  pub balance_after_cents: Option<Cents>,
  pub order: Option<Order>,
}

impl WalletOrderCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, items: Vec<OrderLine>, notes: Option<String>) -> Self {
    Self {
      app_state,
      user_id,
      items,
      notes,
      total_cents: 0,
      display_id: None,
      balance_after_cents: None,
      order: None,
    }
  }
}

impl CheckoutCtx for WalletOrderCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn items(&self) -> &[OrderLine] {
    &self.items
  }
  fn set_total_cents(&mut self, total_cents: Cents) {
    self.total_cents = total_cents;
  }
  fn set_display_id(&mut self, display_id: i64) {
    self.display_id = Some(display_id);
  }
}

#[derive(Clone)]
pub struct CardPaymentCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub items: Vec<OrderLine>,
  pub total_cents: Cents,
  pub display_id: Option<i64>,
  pub customer: Option<UserProfile>,
  pub gateway_order_id: Option<i64>,
  pub payment_key: Option<String>,
  pub order: Option<Order>,
  pub redirect_url: Option<String>,
}

impl CardPaymentCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, items: Vec<OrderLine>) -> Self {
    Self {
      app_state,
      user_id,
      items,
      total_cents: 0,
      display_id: None,
      customer: None,
      gateway_order_id: None,
      payment_key: None,
      order: None,
      redirect_url: None,
    }
  }
}

impl CheckoutCtx for CardPaymentCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn items(&self) -> &[OrderLine] {
    &self.items
  }
  fn set_total_cents(&mut self, total_cents: Cents) {
    self.total_cents = total_cents;
  }
  fn set_display_id(&mut self, display_id: i64) {
    self.display_id = Some(display_id);
  }
}

#[derive(Clone)]
pub struct PaymentCallbackCtxData {
  pub app_state: AppState,
  pub payload: Value,
  /// The `hmac` query parameter, if the gateway sent one.
  pub signature: Option<String>,
  pub facts: Option<CallbackFacts>,
  pub outcome: Option<CallbackOutcome>,
}

impl PaymentCallbackCtxData {
  pub fn new(app_state: AppState, payload: Value, signature: Option<String>) -> Self {
    Self {
      app_state,
      payload,
      signature,
      facts: None,
      outcome: None,
    }
  }
}

/// The part of a status change both staff pipelines share.
#[derive(Debug, Clone)]
pub struct StatusChange {
  pub display_id: i64,
  pub target: OrderStatus,
  pub order: Option<Order>,
  /// Set when the order already had the target status.
  pub unchanged: bool,
}

impl StatusChange {
  pub fn new(display_id: i64, target: OrderStatus) -> Self {
    Self {
      display_id,
      target,
      order: None,
      unchanged: false,
    }
  }
}

pub trait StatusChangeCtx: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn change(&self) -> &StatusChange;
  fn change_mut(&mut self) -> &mut StatusChange;
}

#[derive(Clone)]
pub struct AdvanceStatusCtxData {
  pub app_state: AppState,
  pub change: StatusChange,
  pub notification: Option<DispatchReport>,
}

impl AdvanceStatusCtxData {
  pub fn new(app_state: AppState, display_id: i64, target: OrderStatus) -> Self {
    Self {
      app_state,
      change: StatusChange::new(display_id, target),
      notification: None,
    }
  }
}

impl StatusChangeCtx for AdvanceStatusCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn change(&self) -> &StatusChange {
    &self.change
  }
  fn change_mut(&mut self) -> &mut StatusChange {
    &mut self.change
  }
}

#[derive(Clone)]
pub struct RejectOrderCtxData {
  pub app_state: AppState,
  pub change: StatusChange,
  pub reason: String,
  pub refunded_cents: Option<Cents>,
  /// Set when the rejected order had already been paid by card.
  pub card_reversal_required: bool,
  pub notification: Option<DispatchReport>,
}

impl RejectOrderCtxData {
  pub fn new(app_state: AppState, display_id: i64, reason: String) -> Self {
    Self {
      app_state,
      change: StatusChange::new(display_id, OrderStatus::Rejected),
      reason,
      refunded_cents: None,
      card_reversal_required: false,
      notification: None,
    }
  }
}

impl StatusChangeCtx for RejectOrderCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn change(&self) -> &StatusChange {
    &self.change
  }
  fn change_mut(&mut self) -> &mut StatusChange {
    &mut self.change
  }
}
