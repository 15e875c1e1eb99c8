// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use canteen_server::config::AppConfig;
use canteen_server::errors::{AppError, Result};
use canteen_server::models::{
  Cents, MenuItem, Order, OrderLine, OrderStatus, PaymentMethod, PushSubscription, SubscriptionKeys, UserProfile,
};
use canteen_server::services::identity::{ALREADY_REGISTERED_MESSAGE, BAD_CREDENTIALS_MESSAGE, INVALID_TOKEN_MESSAGE};
use canteen_server::services::{
  AuthSession, IdentityProvider, IdentityUser, PaymentGateway, PaymentKeyRequest, PushError, PushTransport,
  SignUpOutcome,
};
use canteen_server::state::AppState;
use canteen_server::store::{ActiveOrder, InMemoryLedger, LedgerStore};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Level;
use uuid::Uuid;

pub const DASHBOARD_PASSWORD: &str = "staff-only";
pub const HMAC_SECRET: &str = "callback-secret";
/// `ScriptedGateway` derives its order ids from the display id with this offset.
pub const GATEWAY_ORDER_OFFSET: i64 = 900_000;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Identity ---

#[derive(Default)]
struct IdentityTables {
  accounts: HashMap<String, (Uuid, String)>,
  tokens: HashMap<String, Uuid>,
}

/// Identity provider backed by a map; every sign-up comes with a session.
#[derive(Default)]
pub struct StaticIdentity {
  tables: Mutex<IdentityTables>,
}

impl StaticIdentity {
  /// Issues a token for a user created outside `sign_up`.
  pub fn issue_token(&self, user_id: Uuid) -> String {
    let token = format!("token-{}", Uuid::new_v4());
    self.tables.lock().unwrap().tokens.insert(token.clone(), user_id);
    token
  }

  fn session_for(&self, user: IdentityUser) -> AuthSession {
    AuthSession {
      access_token: self.issue_token(user.id),
      token_type: "bearer".to_string(),
      expires_in: Some(3600),
      refresh_token: None,
      user,
    }
  }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
    let user = {
      let mut tables = self.tables.lock().unwrap();
      if tables.accounts.contains_key(email) {
        return Err(AppError::Validation(ALREADY_REGISTERED_MESSAGE.to_string()));
      }
      let id = Uuid::new_v4();
      tables.accounts.insert(email.to_string(), (id, password.to_string()));
      IdentityUser {
        id,
        email: Some(email.to_string()),
      }
    };
    let session = self.session_for(user.clone());
    Ok(SignUpOutcome {
      user,
      session: Some(session),
    })
  }

  async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
    let found = self.tables.lock().unwrap().accounts.get(email).cloned();
    match found {
      Some((id, stored)) if stored == password => Ok(self.session_for(IdentityUser {
        id,
        email: Some(email.to_string()),
      })),
      _ => Err(AppError::Validation(BAD_CREDENTIALS_MESSAGE.to_string())),
    }
  }

  async fn verify_token(&self, token: &str) -> Result<Uuid> {
    self
      .tables
      .lock()
      .unwrap()
      .tokens
      .get(token)
      .copied()
      .ok_or_else(|| AppError::Auth(INVALID_TOKEN_MESSAGE.to_string()))
  }
}

// --- Payment gateway ---

/// Gateway fake: order ids are `GATEWAY_ORDER_OFFSET + display id`.
#[derive(Default)]
pub struct ScriptedGateway {
  pub fail_payment_key: AtomicBool,
  pub registered: Mutex<Vec<(i64, Cents)>>,
  pub key_requests: Mutex<Vec<PaymentKeyRequest>>,
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  async fn authenticate(&self) -> Result<String> {
    Ok("gateway-auth".to_string())
  }

  async fn register_order(&self, _auth_token: &str, merchant_order_id: i64, amount_cents: Cents) -> Result<i64> {
    self.registered.lock().unwrap().push((merchant_order_id, amount_cents));
    Ok(GATEWAY_ORDER_OFFSET + merchant_order_id)
  }

  async fn payment_key(&self, _auth_token: &str, request: &PaymentKeyRequest) -> Result<String> {
    if self.fail_payment_key.load(Ordering::SeqCst) {
      return Err(AppError::Gateway("payment key refused".to_string()));
    }
    self.key_requests.lock().unwrap().push(request.clone());
    Ok(format!("pk-{}", request.gateway_order_id))
  }

  fn checkout_url(&self, payment_key: &str) -> String {
    format!("https://pay.test/iframes/1?payment_token={}", payment_key)
  }
}

// --- Push ---

#[derive(Default)]
pub struct RecordingPush {
  pub sent: Mutex<Vec<(String, Value)>>,
  pub gone: Mutex<HashSet<String>>,
  pub broken: Mutex<HashSet<String>>,
}

impl RecordingPush {
  pub fn mark_gone(&self, endpoint: &str) {
    self.gone.lock().unwrap().insert(endpoint.to_string());
  }

  pub fn mark_broken(&self, endpoint: &str) {
    self.broken.lock().unwrap().insert(endpoint.to_string());
  }

  pub fn sent_to(&self) -> Vec<String> {
    self.sent.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
  }

  pub fn bodies(&self) -> Vec<Value> {
    self.sent.lock().unwrap().iter().map(|(_, v)| v.clone()).collect()
  }
}

#[async_trait]
impl PushTransport for RecordingPush {
  async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> std::result::Result<(), PushError> {
    if self.gone.lock().unwrap().contains(&subscription.endpoint) {
      return Err(PushError::Gone);
    }
    if self.broken.lock().unwrap().contains(&subscription.endpoint) {
      return Err(PushError::Delivery("connection reset".to_string()));
    }
    let body = serde_json::from_slice(payload).unwrap_or(Value::Null);
    self.sent.lock().unwrap().push((subscription.endpoint.clone(), body));
    Ok(())
  }
}

// --- Store with injectable insert failure ---

/// Delegates to an `InMemoryLedger` but can be told to fail order inserts.
pub struct FlakyLedger {
  pub inner: Arc<InMemoryLedger>,
  pub fail_inserts: AtomicBool,
  pub insert_attempts: AtomicUsize,
  /// Confirms the card payment just before a rejection is written, as if the
  /// gateway callback raced the staff member.
  pub pay_before_reject: AtomicBool,
}

impl FlakyLedger {
  pub fn new(inner: Arc<InMemoryLedger>) -> Self {
    Self {
      inner,
      fail_inserts: AtomicBool::new(false),
      insert_attempts: AtomicUsize::new(0),
      pay_before_reject: AtomicBool::new(false),
    }
  }
}

#[async_trait]
impl LedgerStore for FlakyLedger {
  async fn insert_profile(&self, profile: &UserProfile) -> Result<()> {
    self.inner.insert_profile(profile).await
  }
  async fn create_wallet(&self, user_id: Uuid, balance_cents: Cents) -> Result<()> {
    self.inner.create_wallet(user_id, balance_cents).await
  }
  async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
    self.inner.profile(user_id).await
  }
  async fn profile_by_student_id(&self, student_id: &str) -> Result<Option<UserProfile>> {
    self.inner.profile_by_student_id(student_id).await
  }
  async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<Cents>> {
    self.inner.wallet_balance(user_id).await
  }
  async fn debit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Option<Cents>> {
    self.inner.debit_wallet(user_id, amount).await
  }
  async fn credit_wallet(&self, user_id: Uuid, amount: Cents) -> Result<Cents> {
    self.inner.credit_wallet(user_id, amount).await
  }
  async fn next_display_id(&self) -> Result<i64> {
    self.inner.next_display_id().await
  }
  async fn insert_order(&self, order: &Order) -> Result<()> {
    self.insert_attempts.fetch_add(1, Ordering::SeqCst);
    if self.fail_inserts.load(Ordering::SeqCst) {
      return Err(AppError::Store("connection lost".to_string()));
    }
    self.inner.insert_order(order).await
  }
  async fn order_by_display_id(&self, display_id: i64) -> Result<Option<Order>> {
    self.inner.order_by_display_id(display_id).await
  }
  async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    self.inner.orders_for_user(user_id).await
  }
  async fn active_orders(&self) -> Result<Vec<ActiveOrder>> {
    self.inner.active_orders().await
  }
  async fn confirm_card_payment(&self, display_id: i64) -> Result<bool> {
    self.inner.confirm_card_payment(display_id).await
  }
  async fn update_order_status(&self, display_id: i64, from: OrderStatus, to: OrderStatus) -> Result<bool> {
    self.inner.update_order_status(display_id, from, to).await
  }
  async fn mark_rejected(&self, display_id: i64, reason: &str) -> Result<Option<PaymentMethod>> {
    if self.pay_before_reject.load(Ordering::SeqCst) {
      self.inner.confirm_card_payment(display_id).await?;
    }
    self.inner.mark_rejected(display_id, reason).await
  }
  async fn menu(&self) -> Result<Vec<MenuItem>> {
    self.inner.menu().await
  }
  async fn subscriptions_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
    self.inner.subscriptions_for_user(user_id).await
  }
  async fn upsert_subscription(&self, user_id: Uuid, subscription: &PushSubscription) -> Result<()> {
    self.inner.upsert_subscription(user_id, subscription).await
  }
  async fn delete_subscription(&self, endpoint: &str, owner: Option<Uuid>) -> Result<bool> {
    self.inner.delete_subscription(endpoint, owner).await
  }
}

// --- App wiring ---

pub fn test_config(hmac_secret: Option<&str>) -> AppConfig {
  let mut vars: HashMap<&str, String> = HashMap::from([
    ("STORE_BACKEND", "memory".to_string()),
    ("SUPABASE_URL", "https://auth.test".to_string()),
    ("SUPABASE_KEY", "anon".to_string()),
    ("PAYMOB_API_KEY", "paymob".to_string()),
    ("PAYMOB_INTEGRATION_ID", "4242".to_string()),
    ("PAYMOB_IFRAME_ID", "1".to_string()),
    ("DASHBOARD_PASSWORD", DASHBOARD_PASSWORD.to_string()),
    ("VAPID_PUBLIC_KEY", "BTestPublicKey".to_string()),
    ("VAPID_PRIVATE_KEY", "test-private".to_string()),
  ]);
  if let Some(secret) = hmac_secret {
    vars.insert("PAYMOB_HMAC_SECRET", secret.to_string());
  }
  AppConfig::from_source(|k| vars.get(k).cloned()).expect("test config must load")
}

pub struct TestApp {
  pub state: AppState,
  pub ledger: Arc<InMemoryLedger>,
  pub flaky: Arc<FlakyLedger>,
  pub identity: Arc<StaticIdentity>,
  pub gateway: Arc<ScriptedGateway>,
  pub push: Arc<RecordingPush>,
}

impl TestApp {
  pub fn new() -> Self {
    Self::with_config(test_config(None))
  }

  pub fn with_config(config: AppConfig) -> Self {
    setup_tracing();
    let ledger = Arc::new(InMemoryLedger::new());
    let flaky = Arc::new(FlakyLedger::new(ledger.clone()));
    let identity = Arc::new(StaticIdentity::default());
    let gateway = Arc::new(ScriptedGateway::default());
    let push = Arc::new(RecordingPush::default());
    let state = AppState::new(config, flaky.clone(), identity.clone(), gateway.clone(), push.clone());
    Self {
      state,
      ledger,
      flaky,
      identity,
      gateway,
      push,
    }
  }

  /// A student with a profile, a wallet and a valid token.
  pub async fn student(&self, name: &str, student_id: &str, balance_cents: Cents) -> (UserProfile, String) {
    let profile = UserProfile {
      id: Uuid::new_v4(),
      name: name.to_string(),
      student_id: student_id.to_string(),
    };
    self.ledger.insert_profile(&profile).await.expect("profile insert");
    self.ledger.set_balance(profile.id, balance_cents).await;
    let token = self.identity.issue_token(profile.id);
    (profile, token)
  }

  pub async fn balance(&self, user_id: Uuid) -> Cents {
    self.ledger.wallet_balance(user_id).await.unwrap().expect("wallet exists")
  }

  pub async fn order(&self, display_id: i64) -> Order {
    self
      .ledger
      .order_by_display_id(display_id)
      .await
      .unwrap()
      .expect("order exists")
  }

  pub async fn subscribe(&self, user_id: Uuid, endpoint: &str) {
    let subscription = PushSubscription {
      endpoint: endpoint.to_string(),
      keys: SubscriptionKeys {
        p256dh: "BKey".to_string(),
        auth: "auth".to_string(),
      },
    };
    self.ledger.upsert_subscription(user_id, &subscription).await.unwrap();
  }
}

pub fn line(name: &str, price_cents: Cents, quantity: u32) -> OrderLine {
  OrderLine {
    name: name.to_string(),
    unit_price_cents: price_cents,
    quantity,
  }
}

/// A processed-transaction callback as the gateway posts it.
pub fn callback_payload(success: bool, display_id: i64, gateway_order_id: i64) -> Value {
  json!({
    "type": "TRANSACTION",
    "obj": {
      "id": 5551234,
      "pending": false,
      "amount_cents": 4000,
      "success": success,
      "order": { "id": gateway_order_id, "merchant_order_id": display_id.to_string() },
      "currency": "EGP"
    }
  })
}
