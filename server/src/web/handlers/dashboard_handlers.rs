// canteen-server/src/web/handlers/dashboard_handlers.rs

//! Staff dashboard routes. All of them sit behind `DashboardAuth`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{money, Cents, OrderStatus};
use crate::state::AppState;
use crate::web::extractors::DashboardAuth;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequestPayload {
  pub display_id: i64,
  pub status: OrderStatus,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RejectOrderRequestPayload {
  pub display_id: i64,
  pub reason: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FindUserRequestPayload {
  pub student_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChargeWalletRequestPayload {
  pub user_id: Uuid,
  #[serde(with = "money::decimal")]
  pub amount: Cents,
}

#[instrument(name = "handler::all_orders", skip_all)]
pub async fn all_orders_handler(app_state: web::Data<AppState>, _auth: DashboardAuth) -> Result<HttpResponse, AppError> {
  let orders = app_state.store.active_orders().await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::update_order_status", skip(app_state, _auth, req_payload), fields(display_id = req_payload.display_id))]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  _auth: DashboardAuth,
  req_payload: web::Json<UpdateStatusRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let update = app_state
    .lifecycle()
    .advance_status(req_payload.display_id, req_payload.status)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "update": update })))
}

#[instrument(name = "handler::reject_order", skip(app_state, _auth, req_payload), fields(display_id = req_payload.display_id))]
pub async fn reject_order_handler(
  app_state: web::Data<AppState>,
  _auth: DashboardAuth,
  req_payload: web::Json<RejectOrderRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let update = app_state.lifecycle().reject_order(payload.display_id, payload.reason).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "update": update })))
}

#[instrument(name = "handler::find_user", skip(app_state, _auth, req_payload), fields(student_id = %req_payload.student_id))]
pub async fn find_user_handler(
  app_state: web::Data<AppState>,
  _auth: DashboardAuth,
  req_payload: web::Json<FindUserRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let profile = app_state
    .store
    .profile_by_student_id(req_payload.student_id.trim())
    .await?
    .ok_or_else(|| AppError::NotFound("لم يتم العثور على المستخدم.".to_string()))?;
  let balance = app_state.store.wallet_balance(profile.id).await?.unwrap_or(0);
  Ok(HttpResponse::Ok().json(json!({
      "user": profile,
      "balance": money::from_cents(balance),
  })))
}

/// Largest single top-up accepted at the counter (100,000.00).
pub const MAX_CHARGE_CENTS: Cents = 10_000_000;

/// Tops up a wallet at the counter.
#[instrument(name = "handler::charge_wallet", skip(app_state, _auth, req_payload), fields(user_id = %req_payload.user_id, amount_cents = req_payload.amount))]
pub async fn charge_wallet_handler(
  app_state: web::Data<AppState>,
  _auth: DashboardAuth,
  req_payload: web::Json<ChargeWalletRequestPayload>,
) -> Result<HttpResponse, AppError> {
  if req_payload.amount <= 0 {
    return Err(AppError::Validation("Charge amount must be positive.".to_string()));
  }
  if req_payload.amount > MAX_CHARGE_CENTS {
    return Err(AppError::Validation(format!(
      "Charge amount may not exceed {:.2}.",
      money::from_cents(MAX_CHARGE_CENTS)
    )));
  }
  let balance = app_state
    .store
    .credit_wallet(req_payload.user_id, req_payload.amount)
    .await?;
  info!(balance, "Wallet charged.");
  Ok(HttpResponse::Ok().json(json!({ "newBalance": money::from_cents(balance) })))
}
