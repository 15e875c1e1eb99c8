// canteen-server/src/web/handlers/push_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::PushSubscription;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct UnsubscribeRequestPayload {
  pub endpoint: String,
}

pub async fn vapid_public_key_handler(app_state: web::Data<AppState>) -> HttpResponse {
  HttpResponse::Ok().json(json!({ "publicKey": app_state.config.push.vapid_public_key }))
}

#[instrument(name = "handler::subscribe", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.user_id))]
pub async fn subscribe_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<PushSubscription>,
) -> Result<HttpResponse, AppError> {
  let subscription = req_payload.into_inner();
  if subscription.endpoint.trim().is_empty() {
    return Err(AppError::Validation("Subscription endpoint is required.".to_string()));
  }
  app_state.store.upsert_subscription(auth_user.user_id, &subscription).await?;
  info!("Push subscription saved.");
  Ok(HttpResponse::Created().json(json!({ "message": "Subscribed." })))
}

#[instrument(name = "handler::unsubscribe", skip(app_state, auth_user, req_payload), fields(user_id = %auth_user.user_id))]
pub async fn unsubscribe_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  req_payload: web::Json<UnsubscribeRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let removed = app_state
    .store
    .delete_subscription(&req_payload.endpoint, Some(auth_user.user_id))
    .await?;
  info!(removed, "Push unsubscribe handled.");
  Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}
