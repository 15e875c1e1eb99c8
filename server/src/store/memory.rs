// canteen-server/src/store/memory.rs

use crate::errors::{AppError, Result};
use crate::models::{Cents, MenuItem, Order, OrderStatus, PaymentMethod, PushSubscription, UserProfile};
use crate::store::{ActiveOrder, LedgerStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  profiles: HashMap<Uuid, UserProfile>,
  wallets: HashMap<Uuid, Cents>,
  orders: Vec<Order>,
  menu: Vec<MenuItem>,
  subscriptions: Vec<(Uuid, PushSubscription)>,
}

/// Process-local ledger. Every operation runs under one mutex, which gives
/// the same atomicity the Postgres statements give.
pub struct InMemoryLedger {
  tables: Mutex<Tables>,
  display_ids: AtomicI64,
}

impl Default for InMemoryLedger {
  fn default() -> Self {
    Self::new()
  }
}

impl InMemoryLedger {
  pub fn new() -> Self {
    Self {
      tables: Mutex::new(Tables::default()),
      display_ids: AtomicI64::new(1000),
    }
  }

  pub async fn add_menu_item(&self, item: MenuItem) {
    self.tables.lock().await.menu.push(item);
  }

  /// Overwrites a wallet balance, creating the wallet if needed.
  pub async fn set_balance(&self, user_id: Uuid, balance_cents: Cents) {
    self.tables.lock().await.wallets.insert(user_id, balance_cents);
  }

  pub async fn order_count(&self) -> usize {
    self.tables.lock().await.orders.len()
  }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
  async fn insert_profile(&self, profile: &UserProfile) -> Result<()> {
    let mut tables = self.tables.lock().await;
    if tables.profiles.values().any(|p| p.student_id == profile.student_id) {
      return Err(AppError::Store(format!("student id {} already has a profile", profile.student_id)));
    }
    tables.profiles.insert(profile.id, profile.clone());
    Ok(())
  }

  async fn create_wallet(&self, user_id: Uuid, balance_cents: Cents) -> Result<()> {
    let mut tables = self.tables.lock().await;
    if tables.wallets.contains_key(&user_id) {
      return Err(AppError::Store(format!("wallet for {} already exists", user_id)));
    }
    tables.wallets.insert(user_id, balance_cents);
    Ok(())
  }

  async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
    Ok(self.tables.lock().await.profiles.get(&user_id).cloned())
  }

  async fn profile_by_student_id(&self, student_id: &str) -> Result<Option<UserProfile>> {
    let tables = self.tables.lock().await;
    Ok(tables.profiles.values().find(|p| p.student_id == student_id).cloned())
  }

  async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<Cents>> {
    Ok(self.tables.lock().await.wallets.get(&user_id).copied())
  }

  async fn debit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Option<Cents>> {
    let mut tables = self.tables.lock().await;
    match tables.wallets.get_mut(&user_id) {
      Some(balance) if *balance >= amount => {
        *balance -= amount;
        Ok(Some(*balance))
      }
      _ => Ok(None),
    }
  }

  async fn credit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Cents> {
    let mut tables = self.tables.lock().await;
    let balance = tables
      .wallets
      .get_mut(&user_id)
      .ok_or_else(|| AppError::NotFound(format!("No wallet for user {}", user_id)))?;
    *balance = balance
      .checked_add(amount)
      .ok_or_else(|| AppError::Validation("Wallet balance would overflow.".to_string()))?;
    Ok(*balance)
  }

  async fn next_display_id(&self) -> Result<i64> {
    Ok(self.display_ids.fetch_add(1, Ordering::SeqCst) + 1)
  }

  async fn insert_order(&self, order: &Order) -> Result<()> {
    let mut tables = self.tables.lock().await;
    if tables.orders.iter().any(|o| o.display_id == order.display_id) {
      return Err(AppError::Store(format!("display id {} already used", order.display_id)));
    }
    tables.orders.push(order.clone());
    Ok(())
  }

  async fn order_by_display_id(&self, display_id: i64) -> Result<Option<Order>> {
    let tables = self.tables.lock().await;
    Ok(tables.orders.iter().find(|o| o.display_id == display_id).cloned())
  }

  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let tables = self.tables.lock().await;
    let mut orders: Vec<Order> = tables
      .orders
      .iter()
      .filter(|o| o.user_id == user_id && o.payment_method != PaymentMethod::CardPending)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.display_id.cmp(&a.display_id)));
    Ok(orders)
  }

  async fn active_orders(&self) -> Result<Vec<ActiveOrder>> {
    let tables = self.tables.lock().await;
    let mut active: Vec<ActiveOrder> = tables
      .orders
      .iter()
      .filter(|o| o.status.is_active())
      .map(|o| ActiveOrder {
        order: o.clone(),
        user: tables.profiles.get(&o.user_id).cloned(),
      })
      .collect();
    active.sort_by(|a, b| {
      a.order
        .created_at
        .cmp(&b.order.created_at)
        .then(a.order.display_id.cmp(&b.order.display_id))
    });
    Ok(active)
  }

  async fn confirm_card_payment(&self, display_id: i64) -> Result<bool> {
    let mut tables = self.tables.lock().await;
    let Some(order) = tables
      .orders
      .iter_mut()
      .find(|o| o.display_id == display_id && o.payment_method == PaymentMethod::CardPending)
    else {
      return Ok(false);
    };
    order.payment_method = PaymentMethod::Card;
    if order.status == OrderStatus::PendingPayment {
      order.status = OrderStatus::Preparing;
    }
    Ok(true)
  }

  async fn update_order_status(&self, display_id: i64, from: OrderStatus, to: OrderStatus) -> Result<bool> {
    let mut tables = self.tables.lock().await;
    match tables.orders.iter_mut().find(|o| o.display_id == display_id && o.status == from) {
      Some(order) => {
        order.status = to;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn mark_rejected(&self, display_id: i64, reason: &str) -> Result<Option<PaymentMethod>> {
    let mut tables = self.tables.lock().await;
    let rejectable = |o: &&mut Order| {
      o.display_id == display_id && matches!(o.status, OrderStatus::PendingPayment | OrderStatus::Preparing)
    };
    match tables.orders.iter_mut().find(rejectable) {
      Some(order) => {
        order.status = OrderStatus::Rejected;
        order.notes = Some(reason.to_string());
        Ok(Some(order.payment_method))
      }
      None => Ok(None),
    }
  }

  async fn menu(&self) -> Result<Vec<MenuItem>> {
    Ok(self.tables.lock().await.menu.clone())
  }

  async fn subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
    let tables = self.tables.lock().await;
    Ok(
      tables
        .subscriptions
        .iter()
        .filter(|(owner, _)| *owner == user_id)
        .map(|(_, s)| s.clone())
        .collect(),
    )
  }

  async fn upsert_subscription(&self, user_id: Uuid, subscription: &PushSubscription) -> Result<()> {
    let mut tables = self.tables.lock().await;
    tables.subscriptions.retain(|(_, s)| s.endpoint != subscription.endpoint);
    tables.subscriptions.push((user_id, subscription.clone()));
    Ok(())
  }

  async fn delete_subscription(&self, endpoint: &str, owner: Option<Uuid>) -> Result<bool> {
    let mut tables = self.tables.lock().await;
    let before = tables.subscriptions.len();
    tables
      .subscriptions
      .retain(|(user, s)| !(s.endpoint == endpoint && owner.map_or(true, |o| o == *user)));
    Ok(tables.subscriptions.len() != before)
  }
}
