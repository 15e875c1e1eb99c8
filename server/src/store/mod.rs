// canteen-server/src/store/mod.rs

//! The ledger store: profiles, wallets, menu, orders and push subscriptions.

pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{Cents, MenuItem, Order, OrderStatus, PaymentMethod, PushSubscription, UserProfile};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

pub use memory::InMemoryLedger;
pub use postgres::PgLedger;

/// An order on the staff board together with whoever placed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveOrder {
  #[serde(flatten)]
  pub order: Order,
  pub user: Option<UserProfile>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
  async fn insert_profile(&self, profile: &UserProfile) -> Result<()>;

  async fn create_wallet(&self, user_id: Uuid, balance_cents: Cents) -> Result<()>;

  async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>>;

  async fn profile_by_student_id(&self, student_id: &str) -> Result<Option<UserProfile>>;

  async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<Cents>>;

  /// Subtracts `amount` only if the balance covers it, in one atomic step.
  /// Returns the new balance, or `None` when funds are insufficient or the
  /// wallet does not exist.
  async fn debit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Option<Cents>>;

  /// Adds `amount` and returns the new balance. `NotFound` without a wallet.
  async fn credit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Cents>;

  /// Next value of the shared order counter. Never returns the same value twice.
  async fn next_display_id(&self) -> Result<i64>;

  async fn insert_order(&self, order: &Order) -> Result<()>;

  async fn order_by_display_id(&self, display_id: i64) -> Result<Option<Order>>;

  /// The user's orders, newest first, without unconfirmed card orders.
  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;

  /// Preparing and ready orders, oldest first.
  async fn active_orders(&self) -> Result<Vec<ActiveOrder>>;

  /// Flips `card_pending` to `card` and a pending-payment status to
  /// preparing. Returns whether the order changed; repeated calls are no-ops.
  async fn confirm_card_payment(&self, display_id: i64) -> Result<bool>;

  /// Moves the order from `from` to `to`. Returns false when the order was no
  /// longer in `from`.
  async fn update_order_status(&self, display_id: i64, from: OrderStatus, to: OrderStatus) -> Result<bool>;

  /// Sets status rejected and stores the reason in the notes, only if the
  /// order is still pending payment or preparing. Returns the order's payment
  /// method as of the update, or `None` when nothing was rejected.
  async fn mark_rejected(&self, display_id: i64, reason: &str) -> Result<Option<PaymentMethod>>;

  async fn menu(&self) -> Result<Vec<MenuItem>>;

  async fn subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>>;

  /// Endpoints are unique; subscribing again moves the endpoint to `user_id`
  /// and refreshes its keys.
  async fn upsert_subscription(&self, user_id: Uuid, subscription: &PushSubscription) -> Result<()>;

  /// Deletes an endpoint, restricted to `owner` when given.
  async fn delete_subscription(&self, endpoint: &str, owner: Option<Uuid>) -> Result<bool>;
}
