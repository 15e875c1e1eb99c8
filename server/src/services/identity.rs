// canteen-server/src/services/identity.rs

//! Hosted identity provider (Supabase GoTrue). Password storage and token
//! issuing live there; this module only calls its REST API.

use crate::config::SupabaseConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const BAD_CREDENTIALS_MESSAGE: &str = "الرقم الجامعي أو كلمة المرور غير صحيحة.";
pub const ALREADY_REGISTERED_MESSAGE: &str = "هذا الرقم الجامعي مسجل بالفعل.";
pub const MISSING_TOKEN_MESSAGE: &str = "No token provided.";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
  pub id: Uuid,
  #[serde(default)]
  pub email: Option<String>,
}

/// Session as issued by the provider, passed through to the client unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
  pub access_token: String,
  pub token_type: String,
  #[serde(default)]
  pub expires_in: Option<i64>,
  #[serde(default)]
  pub refresh_token: Option<String>,
  pub user: IdentityUser,
}

/// Without auto-confirmation the provider returns a bare user and no session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
  pub user: IdentityUser,
  pub session: Option<AuthSession>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome>;

  async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

  /// Resolves a bearer token to the user id it was issued for.
  async fn verify_token(&self, token: &str) -> Result<Uuid>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
  Session(AuthSession),
  User(IdentityUser),
}

#[derive(Debug, Default, Deserialize)]
struct ProviderError {
  msg: Option<String>,
  message: Option<String>,
  error_description: Option<String>,
  error_code: Option<String>,
}

impl ProviderError {
  fn parse(body: &str) -> Self {
    serde_json::from_str(body).unwrap_or_default()
  }

  fn text(&self) -> String {
    self
      .msg
      .clone()
      .or_else(|| self.message.clone())
      .or_else(|| self.error_description.clone())
      .unwrap_or_else(|| "unknown error".to_string())
  }

  fn is_already_registered(&self) -> bool {
    self.error_code.as_deref() == Some("user_already_exists") || self.text().contains("already registered")
  }
}

pub struct SupabaseIdentity {
  http: reqwest::Client,
  config: SupabaseConfig,
}

impl SupabaseIdentity {
  pub fn new(config: SupabaseConfig, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build identity HTTP client: {}", e)))?;
    Ok(Self { http, config })
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}/auth/v1/{}", self.config.url, path)
  }

  async fn read_failure(response: reqwest::Response) -> (StatusCode, ProviderError) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, ProviderError::parse(&body))
  }
}

fn transport_error(e: reqwest::Error) -> AppError {
  AppError::Identity(format!("request to identity provider failed: {}", e))
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
  #[instrument(name = "identity::sign_up", skip(self, password), err(Display))]
  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
    let response = self
      .http
      .post(self.endpoint("signup"))
      .header("apikey", &self.config.api_key)
      .json(&json!({ "email": email, "password": password }))
      .send()
      .await
      .map_err(transport_error)?;

    if !response.status().is_success() {
      let (status, err) = Self::read_failure(response).await;
      if err.is_already_registered() {
        warn!("Sign-up rejected: account already registered.");
        return Err(AppError::Validation(ALREADY_REGISTERED_MESSAGE.to_string()));
      }
      if status.is_client_error() {
        return Err(AppError::Validation(err.text()));
      }
      return Err(AppError::Identity(format!("sign-up failed with {}: {}", status, err.text())));
    }

    let outcome = match response.json::<SignUpResponse>().await.map_err(transport_error)? {
      SignUpResponse::Session(session) => SignUpOutcome {
        user: session.user.clone(),
        session: Some(session),
      },
      SignUpResponse::User(user) => SignUpOutcome { user, session: None },
    };
    info!(user_id = %outcome.user.id, has_session = outcome.session.is_some(), "Identity created.");
    Ok(outcome)
  }

  #[instrument(name = "identity::sign_in", skip(self, password), err(Display))]
  async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
    let response = self
      .http
      .post(self.endpoint("token?grant_type=password"))
      .header("apikey", &self.config.api_key)
      .json(&json!({ "email": email, "password": password }))
      .send()
      .await
      .map_err(transport_error)?;

    let status = response.status();
    // Wrong credentials are a client mistake (400); 401 is kept for bad bearer tokens.
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
      return Err(AppError::Validation(BAD_CREDENTIALS_MESSAGE.to_string()));
    }
    if !status.is_success() {
      let (status, err) = Self::read_failure(response).await;
      return Err(AppError::Identity(format!("sign-in failed with {}: {}", status, err.text())));
    }
    response.json::<AuthSession>().await.map_err(transport_error)
  }

  #[instrument(name = "identity::verify_token", skip_all, err(Display))]
  async fn verify_token(&self, token: &str) -> Result<Uuid> {
    let response = self
      .http
      .get(self.endpoint("user"))
      .header("apikey", &self.config.api_key)
      .bearer_auth(token)
      .send()
      .await
      .map_err(transport_error)?;

    match response.status() {
      s if s.is_success() => Ok(response.json::<IdentityUser>().await.map_err(transport_error)?.id),
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
        Err(AppError::Auth(INVALID_TOKEN_MESSAGE.to_string()))
      }
      s => Err(AppError::Identity(format!("token check failed with {}", s))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognises_duplicate_account_errors() {
    assert!(ProviderError::parse(r#"{"code":400,"msg":"User already registered"}"#).is_already_registered());
    assert!(ProviderError::parse(r#"{"error_code":"user_already_exists","msg":"x"}"#).is_already_registered());
    assert!(!ProviderError::parse(r#"{"msg":"Password should be at least 6 characters"}"#).is_already_registered());
    assert_eq!(ProviderError::parse("not json").text(), "unknown error");
  }

  #[test]
  fn sign_up_response_with_or_without_session() {
    let id = Uuid::new_v4();
    let with_session = format!(
      r#"{{"access_token":"at","token_type":"bearer","expires_in":3600,"refresh_token":"rt","user":{{"id":"{}"}}}}"#,
      id
    );
    assert!(matches!(
      serde_json::from_str::<SignUpResponse>(&with_session).unwrap(),
      SignUpResponse::Session(s) if s.user.id == id
    ));
    let bare = format!(r#"{{"id":"{}","email":"1@chilli-app.io"}}"#, id);
    assert!(matches!(
      serde_json::from_str::<SignUpResponse>(&bare).unwrap(),
      SignUpResponse::User(u) if u.id == id
    ));
  }
}
