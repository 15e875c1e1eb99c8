// canteen-server/src/models/order.rs

use crate::errors::{AppError, Result};
use crate::models::money::{self, Cents};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_LINES_PER_ORDER: usize = 50;
pub const MAX_QUANTITY_PER_LINE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Wallet,
  CardPending,
  Card,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::Wallet => "wallet",
      PaymentMethod::CardPending => "card_pending",
      PaymentMethod::Card => "card",
    }
  }

  pub fn parse(raw: &str) -> Result<Self> {
    match raw {
      "wallet" => Ok(PaymentMethod::Wallet),
      "card_pending" => Ok(PaymentMethod::CardPending),
      "card" => Ok(PaymentMethod::Card),
      other => Err(AppError::Store(format!("Unknown payment method '{}'", other))),
    }
  }
}

/// Serialised with the labels the student and staff apps display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
  #[serde(rename = "بانتظار الدفع", alias = "pending_payment")]
  PendingPayment,
  #[serde(rename = "قيد التحضير", alias = "preparing")]
  Preparing,
  #[serde(rename = "جاهز للاستلام", alias = "ready")]
  Ready,
  #[serde(rename = "مرفوض", alias = "rejected")]
  Rejected,
}

impl OrderStatus {
  /// Storage code.
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::PendingPayment => "pending_payment",
      OrderStatus::Preparing => "preparing",
      OrderStatus::Ready => "ready",
      OrderStatus::Rejected => "rejected",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      OrderStatus::PendingPayment => "بانتظار الدفع",
      OrderStatus::Preparing => "قيد التحضير",
      OrderStatus::Ready => "جاهز للاستلام",
      OrderStatus::Rejected => "مرفوض",
    }
  }

  pub fn parse(raw: &str) -> Result<Self> {
    match raw {
      "pending_payment" => Ok(OrderStatus::PendingPayment),
      "preparing" => Ok(OrderStatus::Preparing),
      "ready" => Ok(OrderStatus::Ready),
      "rejected" => Ok(OrderStatus::Rejected),
      other => Err(AppError::Store(format!("Unknown order status '{}'", other))),
    }
  }

  pub fn is_active(self) -> bool {
    matches!(self, OrderStatus::Preparing | OrderStatus::Ready)
  }
}

/// How a requested status change relates to an order's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Apply,
  /// Already in the requested status; nothing to do.
  Unchanged,
}

/// Staff-driven transitions. `PendingPayment -> Preparing` is reserved for the
/// payment callback and is refused here.
pub fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<Transition> {
  use OrderStatus::*;
  if from == to {
    return Ok(Transition::Unchanged);
  }
  match (from, to) {
    (Preparing, Ready) | (Preparing, Rejected) | (PendingPayment, Rejected) => Ok(Transition::Apply),
    (PendingPayment, Preparing) => Err(AppError::Validation(
      "Card orders move to preparing only when the payment is confirmed.".to_string(),
    )),
    (from, to) => Err(AppError::Validation(format!(
      "Cannot move an order from '{}' to '{}'.",
      from.label(),
      to.label()
    ))),
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub name: String,
  #[serde(rename = "price", alias = "unitPrice", with = "money::decimal")]
  pub unit_price_cents: Cents,
  pub quantity: u32,
}

/// Checks cart limits and returns the order total.
pub fn validate_lines(lines: &[OrderLine]) -> Result<Cents> {
  if lines.is_empty() {
    return Err(AppError::Validation("السلة فارغة.".to_string()));
  }
  if lines.len() > MAX_LINES_PER_ORDER {
    return Err(AppError::Validation(format!(
      "An order can hold at most {} items.",
      MAX_LINES_PER_ORDER
    )));
  }
  let mut total: Cents = 0;
  for line in lines {
    if line.name.trim().is_empty() {
      return Err(AppError::Validation("Every item needs a name.".to_string()));
    }
    if line.quantity == 0 || line.quantity > MAX_QUANTITY_PER_LINE {
      return Err(AppError::Validation(format!(
        "Quantity for '{}' must be between 1 and {}.",
        line.name, MAX_QUANTITY_PER_LINE
      )));
    }
    if line.unit_price_cents < 0 {
      return Err(AppError::Validation(format!("Price for '{}' cannot be negative.", line.name)));
    }
    total = line
      .unit_price_cents
      .checked_mul(Cents::from(line.quantity))
      .and_then(|line_total| total.checked_add(line_total))
      .ok_or_else(|| AppError::Validation("Order total is too large.".to_string()))?;
  }
  Ok(total)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub display_id: i64,
  pub external_payment_id: Option<String>,
  pub user_id: Uuid,
  pub items: Vec<OrderLine>,
  #[serde(rename = "totalPrice", with = "money::decimal")]
  pub total_cents: Cents,
  pub payment_method: PaymentMethod,
  pub status: OrderStatus,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(price: Cents, quantity: u32) -> OrderLine {
    OrderLine {
      name: "Koshary".to_string(),
      unit_price_cents: price,
      quantity,
    }
  }

  #[test]
  fn total_is_sum_of_price_times_quantity() {
    assert_eq!(validate_lines(&[line(2000, 2)]).unwrap(), 4000);
    assert_eq!(validate_lines(&[line(1250, 1), line(0, 3), line(500, 4)]).unwrap(), 3250);
  }

  #[test]
  fn cart_limits_are_enforced() {
    assert!(matches!(validate_lines(&[]), Err(AppError::Validation(_))));
    assert!(matches!(validate_lines(&[line(100, 0)]), Err(AppError::Validation(_))));
    assert!(matches!(validate_lines(&[line(100, 101)]), Err(AppError::Validation(_))));
    assert!(matches!(validate_lines(&[line(-1, 1)]), Err(AppError::Validation(_))));
    assert!(matches!(validate_lines(&[line(i64::MAX, 2)]), Err(AppError::Validation(_))));
    let unnamed = OrderLine {
      name: "  ".to_string(),
      ..line(100, 1)
    };
    assert!(matches!(validate_lines(&[unnamed]), Err(AppError::Validation(_))));
    let too_many = vec![line(100, 1); MAX_LINES_PER_ORDER + 1];
    assert!(matches!(validate_lines(&too_many), Err(AppError::Validation(_))));
  }

  #[test]
  fn transition_table() {
    use OrderStatus::*;
    assert_eq!(check_transition(Preparing, Ready).unwrap(), Transition::Apply);
    assert_eq!(check_transition(Preparing, Rejected).unwrap(), Transition::Apply);
    assert_eq!(check_transition(PendingPayment, Rejected).unwrap(), Transition::Apply);
    assert_eq!(check_transition(Ready, Ready).unwrap(), Transition::Unchanged);
    assert!(check_transition(PendingPayment, Preparing).is_err());
    assert!(check_transition(Ready, Preparing).is_err());
    assert!(check_transition(Rejected, Ready).is_err());
    assert!(check_transition(Ready, Rejected).is_err());
  }

  #[test]
  fn status_uses_localized_labels_and_accepts_codes() {
    assert_eq!(serde_json::to_string(&OrderStatus::Ready).unwrap(), "\"جاهز للاستلام\"");
    let parsed: OrderStatus = serde_json::from_str("\"ready\"").unwrap();
    assert_eq!(parsed, OrderStatus::Ready);
    let parsed: OrderStatus = serde_json::from_str("\"قيد التحضير\"").unwrap();
    assert_eq!(parsed, OrderStatus::Preparing);
    assert_eq!(serde_json::to_string(&PaymentMethod::CardPending).unwrap(), "\"card_pending\"");
  }

  #[test]
  fn line_accepts_price_or_unit_price() {
    let a: OrderLine = serde_json::from_str(r#"{"name":"Tea","price":7.5,"quantity":2}"#).unwrap();
    let b: OrderLine = serde_json::from_str(r#"{"name":"Tea","unitPrice":7.5,"quantity":2}"#).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.unit_price_cents, 750);
  }
}
