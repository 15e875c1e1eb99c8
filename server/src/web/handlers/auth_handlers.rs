// canteen-server/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::SignupCtxData;
use crate::services::identity::BAD_CREDENTIALS_MESSAGE;
use crate::state::AppState;
use orderflow::{ContextData, PipelineResult};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequestPayload {
  pub name: String,
  pub student_id: String,
  pub password: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequestPayload {
  pub student_id: String,
  pub password: String,
}

#[instrument(
    name = "handler::signup",
    skip(app_state, req_payload),
    fields(student_id = %req_payload.student_id)
)]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SignupRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let ctx_data = ContextData::new(SignupCtxData::new(
    app_state.get_ref().clone(),
    payload.name,
    payload.student_id,
    payload.password,
  ));

  match app_state.registry.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let guard = ctx_data.read();
      let user = guard.user.clone().ok_or_else(|| {
        warn!("Signup pipeline completed but no identity was recorded.");
        AppError::Internal("Signup completed without an identity.".to_string())
      })?;
      info!(user_id = %user.id, "Signup successful.");
      Ok(HttpResponse::Ok().json(json!({
          "session": guard.session,
          "user": user,
      })))
    }
    PipelineResult::Stopped => {
      warn!("Signup pipeline was stopped by a handler.");
      Err(AppError::PipelineHaltedByHandler)
    }
  }
}

#[instrument(
    name = "handler::login",
    skip(app_state, req_payload),
    fields(student_id = %req_payload.student_id)
)]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<LoginRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let student_id = req_payload.student_id.trim();
  if student_id.is_empty() || req_payload.password.is_empty() {
    return Err(AppError::Validation(BAD_CREDENTIALS_MESSAGE.to_string()));
  }
  let email = app_state.config.student_email(student_id);
  let session = app_state.identity.sign_in(&email, &req_payload.password).await?;
  info!(user_id = %session.user.id, "Login successful.");
  Ok(HttpResponse::Ok().json(json!({ "session": session })))
}
