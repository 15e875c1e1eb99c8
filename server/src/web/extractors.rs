// canteen-server/src/web/extractors.rs

//! Request guards: a student's bearer token or the shared dashboard password.

use crate::errors::AppError;
use crate::services::identity::{INVALID_TOKEN_MESSAGE, MISSING_TOKEN_MESSAGE};
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use subtle::ConstantTimeEq;
use tracing::warn;
use uuid::Uuid;

const DASHBOARD_DENIED_MESSAGE: &str = "Unauthorized dashboard access.";

fn bearer_token(req: &HttpRequest) -> Option<String> {
  let raw = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
  let token = raw
    .strip_prefix("Bearer ")
    .or_else(|| raw.strip_prefix("bearer "))?
    .trim();
  (!token.is_empty()).then(|| token.to_string())
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
  req
    .app_data::<web::Data<AppState>>()
    .cloned()
    .ok_or_else(|| AppError::Internal("AppState is not registered with the app".to_string()))
}

/// A student whose token the identity provider accepted.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let token = bearer_token(req);
    let state = app_state(req);
    Box::pin(async move {
      let state = state?;
      let token = token.ok_or_else(|| AppError::Auth(MISSING_TOKEN_MESSAGE.to_string()))?;
      let user_id = state.identity.verify_token(&token).await.map_err(|e| match e {
        AppError::Auth(_) => AppError::Auth(INVALID_TOKEN_MESSAGE.to_string()),
        other => other,
      })?;
      Ok(AuthenticatedUser { user_id })
    })
  }
}

/// Staff dashboard access: the bearer token must equal `DASHBOARD_PASSWORD`.
#[derive(Debug, Clone, Copy)]
pub struct DashboardAuth;

impl FromRequest for DashboardAuth {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let outcome = app_state(req).and_then(|state| {
      let expected = state.config.dashboard_password.as_bytes();
      match bearer_token(req) {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected)) => Ok(DashboardAuth),
        _ => {
          warn!(path = req.path(), "Rejected dashboard request.");
          Err(AppError::Auth(DASHBOARD_DENIED_MESSAGE.to_string()))
        }
      }
    });
    ready(outcome)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::test::TestRequest;

  #[test]
  fn bearer_token_parsing() {
    let req = TestRequest::default()
      .insert_header((AUTHORIZATION, "Bearer abc.def"))
      .to_http_request();
    assert_eq!(bearer_token(&req).as_deref(), Some("abc.def"));

    let req = TestRequest::default().insert_header((AUTHORIZATION, "Bearer   ")).to_http_request();
    assert_eq!(bearer_token(&req), None);

    let req = TestRequest::default().insert_header((AUTHORIZATION, "Basic abc")).to_http_request();
    assert_eq!(bearer_token(&req), None);

    assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
  }
}
