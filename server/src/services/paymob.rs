// canteen-server/src/services/paymob.rs

//! Paymob Accept hosted checkout: auth token, order registration, payment key
//! and iframe URL. Also parses and authenticates the transaction callback.

use crate::config::PaymobConfig;
use crate::errors::{AppError, Result};
use crate::models::{Cents, UserProfile};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha512;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument};

/// Lifetime of an issued payment key, in seconds.
pub const PAYMENT_KEY_EXPIRY_SECS: u64 = 3600;

/// Paymob requires every billing field; unknown ones are sent as "NA".
const NOT_APPLICABLE: &str = "NA";

/// Transaction fields concatenated, in this order, for the callback HMAC.
const CALLBACK_HMAC_FIELDS: [&str; 20] = [
  "amount_cents",
  "created_at",
  "currency",
  "error_occured",
  "has_parent_transaction",
  "id",
  "integration_id",
  "is_3d_secure",
  "is_auth",
  "is_capture",
  "is_refunded",
  "is_standalone_payment",
  "is_voided",
  "order.id",
  "owner",
  "pending",
  "source_data.pan",
  "source_data.sub_type",
  "source_data.type",
  "success",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingData {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub phone_number: String,
  pub apartment: String,
  pub floor: String,
  pub street: String,
  pub building: String,
  pub shipping_method: String,
  pub postal_code: String,
  pub city: String,
  pub country: String,
  pub state: String,
}

impl BillingData {
  pub fn for_customer(profile: &UserProfile, email: &str) -> Self {
    let (first_name, last_name) = profile.billing_names();
    let na = || NOT_APPLICABLE.to_string();
    Self {
      first_name,
      last_name,
      email: email.to_string(),
      phone_number: na(),
      apartment: na(),
      floor: na(),
      street: na(),
      building: na(),
      shipping_method: na(),
      postal_code: na(),
      city: na(),
      country: na(),
      state: na(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct PaymentKeyRequest {
  pub gateway_order_id: i64,
  pub amount_cents: Cents,
  pub billing: BillingData,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Exchanges the API key for a short-lived auth token.
  async fn authenticate(&self) -> Result<String>;

  /// Registers an order and returns the gateway's order id. The display id is
  /// the merchant reference that comes back in the callback.
  async fn register_order(&self, auth_token: &str, merchant_order_id: i64, amount_cents: Cents) -> Result<i64>;

  async fn payment_key(&self, auth_token: &str, request: &PaymentKeyRequest) -> Result<String>;

  fn checkout_url(&self, payment_key: &str) -> String;
}

#[derive(Deserialize)]
struct TokenResponse {
  token: String,
}

#[derive(Deserialize)]
struct OrderResponse {
  id: i64,
}

pub struct PaymobGateway {
  http: reqwest::Client,
  config: PaymobConfig,
}

impl PaymobGateway {
  pub fn new(config: PaymobConfig, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build gateway HTTP client: {}", e)))?;
    Ok(Self { http, config })
  }

  async fn post_json<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
    let url = format!("{}{}", self.config.base_url, path);
    let response = self
      .http
      .post(&url)
      .json(body)
      .send()
      .await
      .map_err(|e| AppError::Gateway(format!("POST {} failed: {}", path, e)))?;
    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Err(AppError::Gateway(format!("POST {} returned {}: {}", path, status, detail)));
    }
    response
      .json::<T>()
      .await
      .map_err(|e| AppError::Gateway(format!("POST {} returned an unexpected body: {}", path, e)))
  }
}

#[async_trait]
impl PaymentGateway for PaymobGateway {
  #[instrument(name = "paymob::authenticate", skip(self), err(Display))]
  async fn authenticate(&self) -> Result<String> {
    let body = json!({ "api_key": self.config.api_key });
    let response: TokenResponse = self.post_json("/api/auth/tokens", &body).await?;
    Ok(response.token)
  }

  #[instrument(name = "paymob::register_order", skip(self, auth_token), err(Display))]
  async fn register_order(&self, auth_token: &str, merchant_order_id: i64, amount_cents: Cents) -> Result<i64> {
    let body = json!({
      "auth_token": auth_token,
      "delivery_needed": false,
      "amount_cents": amount_cents,
      "currency": self.config.currency,
      "merchant_order_id": merchant_order_id.to_string(),
      "items": [],
    });
    let response: OrderResponse = self.post_json("/api/ecommerce/orders", &body).await?;
    debug!(gateway_order_id = response.id, "Gateway order registered.");
    Ok(response.id)
  }

  #[instrument(
    name = "paymob::payment_key",
    skip(self, auth_token, request),
    fields(gateway_order_id = request.gateway_order_id),
    err(Display)
  )]
  async fn payment_key(&self, auth_token: &str, request: &PaymentKeyRequest) -> Result<String> {
    let body = json!({
      "auth_token": auth_token,
      "amount_cents": request.amount_cents,
      "expiration": PAYMENT_KEY_EXPIRY_SECS,
      "order_id": request.gateway_order_id,
      "billing_data": request.billing,
      "currency": self.config.currency,
      "integration_id": self.config.integration_id,
    });
    let response: TokenResponse = self.post_json("/api/acceptance/payment_keys", &body).await?;
    Ok(response.token)
  }

  fn checkout_url(&self, payment_key: &str) -> String {
    format!(
      "{}/api/acceptance/iframes/{}?payment_token={}",
      self.config.base_url, self.config.iframe_id, payment_key
    )
  }
}

// --- Callback ---

/// What the pipeline needs from a transaction callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFacts {
  pub success: bool,
  /// Our display id, echoed back as `merchant_order_id`.
  pub merchant_order_id: Option<i64>,
  pub gateway_order_id: Option<i64>,
}

fn lookup<'a>(value: &'a Value, dotted_path: &str) -> Option<&'a Value> {
  dotted_path.split('.').try_fold(value, |current, key| current.get(key))
}

fn as_i64(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn as_bool(value: &Value) -> Option<bool> {
  match value {
    Value::Bool(b) => Some(*b),
    Value::String(s) => s.parse().ok(),
    _ => None,
  }
}

/// The transaction object: `obj` for processed callbacks, else the payload itself.
fn transaction(payload: &Value) -> &Value {
  payload.get("obj").filter(|obj| obj.is_object()).unwrap_or(payload)
}

impl CallbackFacts {
  pub fn from_payload(payload: &Value) -> Self {
    let txn = transaction(payload);
    let success = txn.get("success").and_then(as_bool).unwrap_or(false);
    let merchant_order_id = lookup(txn, "order.merchant_order_id")
      .and_then(as_i64)
      .or_else(|| txn.get("merchant_order_id").and_then(as_i64));
    let gateway_order_id = match txn.get("order") {
      Some(Value::Object(order)) => order.get("id").and_then(as_i64),
      Some(other) => as_i64(other),
      None => None,
    };
    Self {
      success,
      merchant_order_id,
      gateway_order_id,
    }
  }
}

fn hmac_field(value: Option<&Value>) -> String {
  match value {
    Some(Value::String(s)) => s.clone(),
    Some(Value::Bool(b)) => b.to_string(),
    Some(Value::Number(n)) => n.to_string(),
    _ => String::new(),
  }
}

pub fn callback_hmac_message(payload: &Value) -> String {
  let txn = transaction(payload);
  CALLBACK_HMAC_FIELDS
    .iter()
    .map(|field| hmac_field(lookup(txn, field)))
    .collect()
}

pub fn callback_hmac(secret: &str, payload: &Value) -> Result<String> {
  let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Config(format!("Invalid PAYMOB_HMAC_SECRET: {}", e)))?;
  mac.update(callback_hmac_message(payload).as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of the `hmac` query parameter.
pub fn verify_callback_hmac(secret: &str, payload: &Value, provided: &str) -> Result<bool> {
  let expected = callback_hmac(secret, payload)?;
  let provided = provided.trim().to_ascii_lowercase();
  Ok(bool::from(expected.as_bytes().ct_eq(provided.as_bytes())))
}
