// canteen-server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::{money, OrderLine};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct WalletOrderRequestPayload {
  pub items: Vec<OrderLine>,
  #[serde(default)]
  pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CardPaymentRequestPayload {
  pub items: Vec<OrderLine>,
}

#[instrument(name = "handler::user_details", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn user_details_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let profile = app_state
    .store
    .profile(auth_user.user_id)
    .await?
    .ok_or_else(|| AppError::NotFound("User profile not found.".to_string()))?;
  let balance = app_state.store.wallet_balance(auth_user.user_id).await?.unwrap_or(0);
  Ok(HttpResponse::Ok().json(json!({
      "name": profile.name,
      "studentId": profile.student_id,
      "balance": money::from_cents(balance),
  })))
}

/// The student's order history. Unconfirmed card orders are left out.
#[instrument(name = "handler::orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.orders_for_user(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::order_status", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn order_status_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  display_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  let display_id = display_id.into_inner();
  // Someone else's order is reported exactly like a missing one.
  let order = app_state
    .store
    .order_by_display_id(display_id)
    .await?
    .filter(|o| o.user_id == auth_user.user_id)
    .ok_or_else(|| AppError::NotFound(format!("Order #{} not found.", display_id)))?;
  Ok(HttpResponse::Ok().json(json!({
      "displayId": order.display_id,
      "status": order.status,
  })))
}

#[instrument(
    name = "handler::process_wallet_order",
    skip(app_state, auth_user, req_payload),
    fields(user_id = %auth_user.user_id, lines = req_payload.items.len())
)]
pub async fn process_wallet_order_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<WalletOrderRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let receipt = app_state
    .lifecycle()
    .place_wallet_order(auth_user.user_id, payload.items, payload.notes)
    .await?;
  info!(display_id = receipt.display_id, "Wallet order placed.");
  Ok(HttpResponse::Ok().json(json!({
      "displayId": receipt.display_id,
      "totalPrice": money::from_cents(receipt.total_cents),
      "newBalance": money::from_cents(receipt.balance_cents),
  })))
}

#[instrument(
    name = "handler::start_paymob_payment",
    skip(app_state, auth_user, req_payload),
    fields(user_id = %auth_user.user_id, lines = req_payload.items.len())
)]
pub async fn start_paymob_payment_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<CardPaymentRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let checkout = app_state
    .lifecycle()
    .start_card_payment(auth_user.user_id, req_payload.into_inner().items)
    .await?;
  info!(display_id = checkout.display_id, "Card payment started.");
  Ok(HttpResponse::Ok().json(json!({
      "displayId": checkout.display_id,
      "redirectUrl": checkout.redirect_url,
  })))
}
