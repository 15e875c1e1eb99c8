// canteen-server/src/store/postgres.rs

use crate::errors::{AppError, Result};
use crate::models::{
  Cents, MenuItem, Order, OrderLine, OrderStatus, PaymentMethod, PushSubscription, SubscriptionKeys, UserProfile,
};
use crate::store::{ActiveOrder, LedgerStore};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

const ORDER_COLUMNS: &str =
  "o.display_id, o.external_payment_id, o.user_id, o.items, o.total_cents, o.payment_method, o.status, o.notes, o.created_at";

pub struct PgLedger {
  pool: PgPool,
}

impl PgLedger {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn run_migrations(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Store(format!("migration failed: {}", e)))
  }
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile> {
  Ok(UserProfile {
    id: row.try_get("id")?,
    name: row.try_get("name")?,
    student_id: row.try_get("student_id")?,
  })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
  let items: Json<Vec<OrderLine>> = row.try_get("items")?;
  let payment_method: String = row.try_get("payment_method")?;
  let status: String = row.try_get("status")?;
  Ok(Order {
    display_id: row.try_get("display_id")?,
    external_payment_id: row.try_get("external_payment_id")?,
    user_id: row.try_get("user_id")?,
    items: items.0,
    total_cents: row.try_get("total_cents")?,
    payment_method: PaymentMethod::parse(&payment_method)?,
    status: OrderStatus::parse(&status)?,
    notes: row.try_get("notes")?,
    created_at: row.try_get("created_at")?,
  })
}

#[async_trait]
impl LedgerStore for PgLedger {
  #[instrument(skip(self, profile), fields(user_id = %profile.id), err(Display))]
  async fn insert_profile(&self, profile: &UserProfile) -> Result<()> {
    sqlx::query("INSERT INTO users (id, name, student_id) VALUES ($1, $2, $3)")
      .bind(profile.id)
      .bind(&profile.name)
      .bind(&profile.student_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self), err(Display))]
  async fn create_wallet(&self, user_id: Uuid, balance_cents: Cents) -> Result<()> {
    sqlx::query("INSERT INTO wallets (user_id, balance_cents) VALUES ($1, $2)")
      .bind(user_id)
      .bind(balance_cents)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
    let row = sqlx::query("SELECT id, name, student_id FROM users WHERE id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(profile_from_row).transpose()
  }

  async fn profile_by_student_id(&self, student_id: &str) -> Result<Option<UserProfile>> {
    let row = sqlx::query("SELECT id, name, student_id FROM users WHERE student_id = $1")
      .bind(student_id)
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(profile_from_row).transpose()
  }

  async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<Cents>> {
    let balance = sqlx::query_scalar::<_, i64>("SELECT balance_cents FROM wallets WHERE user_id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(balance)
  }

  #[instrument(skip(self), err(Display))]
  async fn debit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Option<Cents>> {
    let balance = sqlx::query_scalar::<_, i64>(
      "UPDATE wallets SET balance_cents = balance_cents - $2, updated_at = now() \
       WHERE user_id = $1 AND balance_cents >= $2 RETURNING balance_cents",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&self.pool)
    .await?;
    Ok(balance)
  }

  #[instrument(skip(self), err(Display))]
  async fn credit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Cents> {
    let balance = sqlx::query_scalar::<_, i64>(
      "UPDATE wallets SET balance_cents = balance_cents + $2, updated_at = now() \
       WHERE user_id = $1 AND balance_cents::numeric + $2 <= 9223372036854775807 \
       RETURNING balance_cents",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&self.pool)
    .await?;
    match balance {
      Some(balance) => Ok(balance),
      None if self.wallet_balance(user_id).await?.is_some() => {
        Err(AppError::Validation("Wallet balance would overflow.".to_string()))
      }
      None => Err(AppError::NotFound(format!("No wallet for user {}", user_id))),
    }
  }

  async fn next_display_id(&self) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>("SELECT nextval('order_display_id_seq')")
      .fetch_one(&self.pool)
      .await?;
    Ok(id)
  }

  #[instrument(skip(self, order), fields(display_id = order.display_id), err(Display))]
  async fn insert_order(&self, order: &Order) -> Result<()> {
    sqlx::query(
      "INSERT INTO orders (display_id, external_payment_id, user_id, items, total_cents, payment_method, status, notes, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(order.display_id)
    .bind(&order.external_payment_id)
    .bind(order.user_id)
    .bind(Json(&order.items))
    .bind(order.total_cents)
    .bind(order.payment_method.as_str())
    .bind(order.status.as_str())
    .bind(&order.notes)
    .bind(order.created_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn order_by_display_id(&self, display_id: i64) -> Result<Option<Order>> {
    let row = sqlx::query(&format!("SELECT {} FROM orders o WHERE o.display_id = $1", ORDER_COLUMNS))
      .bind(display_id)
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(order_from_row).transpose()
  }

  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    let rows = sqlx::query(&format!(
      "SELECT {} FROM orders o WHERE o.user_id = $1 AND o.payment_method <> 'card_pending' \
       ORDER BY o.created_at DESC, o.display_id DESC",
      ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(order_from_row).collect()
  }

  async fn active_orders(&self) -> Result<Vec<ActiveOrder>> {
    let rows = sqlx::query(&format!(
      "SELECT {}, u.id AS owner_id, u.name AS owner_name, u.student_id AS owner_student_id \
       FROM orders o LEFT JOIN users u ON u.id = o.user_id \
       WHERE o.status IN ('preparing', 'ready') \
       ORDER BY o.created_at ASC, o.display_id ASC",
      ORDER_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await?;
    rows
      .iter()
      .map(|row| -> Result<ActiveOrder> {
        let owner_id: Option<Uuid> = row.try_get("owner_id")?;
        let user = match owner_id {
          Some(id) => Some(UserProfile {
            id,
            name: row.try_get("owner_name")?,
            student_id: row.try_get("owner_student_id")?,
          }),
          None => None,
        };
        Ok(ActiveOrder {
          order: order_from_row(row)?,
          user,
        })
      })
      .collect()
  }

  #[instrument(skip(self), err(Display))]
  async fn confirm_card_payment(&self, display_id: i64) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE orders SET payment_method = 'card', \
       status = CASE WHEN status = 'pending_payment' THEN 'preparing' ELSE status END \
       WHERE display_id = $1 AND payment_method = 'card_pending'",
    )
    .bind(display_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  #[instrument(skip(self), err(Display))]
  async fn update_order_status(&self, display_id: i64, from: OrderStatus, to: OrderStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE orders SET status = $3 WHERE display_id = $1 AND status = $2")
      .bind(display_id)
      .bind(from.as_str())
      .bind(to.as_str())
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  #[instrument(skip(self, reason), err(Display))]
  async fn mark_rejected(&self, display_id: i64, reason: &str) -> Result<Option<PaymentMethod>> {
    let method = sqlx::query_scalar::<_, String>(
      "UPDATE orders SET status = 'rejected', notes = $2 \
       WHERE display_id = $1 AND status IN ('pending_payment', 'preparing') \
       RETURNING payment_method",
    )
    .bind(display_id)
    .bind(reason)
    .fetch_optional(&self.pool)
    .await?;
    method.as_deref().map(PaymentMethod::parse).transpose()
  }

  async fn menu(&self) -> Result<Vec<MenuItem>> {
    let rows = sqlx::query(
      "SELECT id, name, price_cents, category, description, image_url, available FROM menu ORDER BY category, id",
    )
    .fetch_all(&self.pool)
    .await?;
    rows
      .iter()
      .map(|row| -> Result<MenuItem> {
        Ok(MenuItem {
          id: row.try_get("id")?,
          name: row.try_get("name")?,
          price_cents: row.try_get("price_cents")?,
          category: row.try_get("category")?,
          description: row.try_get("description")?,
          image_url: row.try_get("image_url")?,
          available: row.try_get("available")?,
        })
      })
      .collect()
  }

  async fn subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
    let rows = sqlx::query("SELECT endpoint, p256dh, auth FROM push_subscriptions WHERE user_id = $1")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    rows
      .iter()
      .map(|row| -> Result<PushSubscription> {
        Ok(PushSubscription {
          endpoint: row.try_get("endpoint")?,
          keys: SubscriptionKeys {
            p256dh: row.try_get("p256dh")?,
            auth: row.try_get("auth")?,
          },
        })
      })
      .collect()
  }

  #[instrument(skip(self, subscription), err(Display))]
  async fn upsert_subscription(&self, user_id: Uuid, subscription: &PushSubscription) -> Result<()> {
    sqlx::query(
      "INSERT INTO push_subscriptions (endpoint, user_id, p256dh, auth) VALUES ($1, $2, $3, $4) \
       ON CONFLICT (endpoint) DO UPDATE SET user_id = EXCLUDED.user_id, p256dh = EXCLUDED.p256dh, auth = EXCLUDED.auth",
    )
    .bind(&subscription.endpoint)
    .bind(user_id)
    .bind(&subscription.keys.p256dh)
    .bind(&subscription.keys.auth)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn delete_subscription(&self, endpoint: &str, owner: Option<Uuid>) -> Result<bool> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1 AND ($2::uuid IS NULL OR user_id = $2)")
      .bind(endpoint)
      .bind(owner)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }
}
