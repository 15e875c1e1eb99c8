// canteen-server/src/pipelines/signup_pipeline.rs

use crate::errors::AppError;
use crate::models::UserProfile;
use crate::pipelines::contexts::SignupCtxData;
use orderflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{event, info, warn, Level};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Registers the student sign-up pipeline.
pub fn register_signup_pipeline(registry: &Registry<AppError>) {
  let mut signup_p = Pipeline::<SignupCtxData, AppError>::new(&[
    ("validate_signup_input", false, None),
    ("register_identity", false, None),
    ("insert_profile", false, None),
    ("create_wallet", false, None),
  ]);

  signup_p.on_root("validate_signup_input", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (name, student_id, password_len, email) = {
        let guard = ctx_data.read();
        (
          guard.name.trim().to_string(),
          guard.student_id.trim().to_string(),
          guard.password.chars().count(),
          guard.app_state.config.student_email(guard.student_id.trim()),
        )
      };

      event!(Level::DEBUG, %student_id, "Validating signup input.");
      if name.is_empty() {
        return Err(AppError::Validation("الاسم مطلوب.".to_string()));
      }
      if student_id.is_empty() || student_id.contains(|c: char| c.is_whitespace() || c == '@') {
        warn!("Invalid student id provided for signup.");
        return Err(AppError::Validation("الرقم الجامعي غير صالح.".to_string()));
      }
      if password_len < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
          "Password must be at least {} characters long.",
          MIN_PASSWORD_LEN
        )));
      }

      let mut guard = ctx_data.write();
      guard.name = name;
      guard.student_id = student_id;
      guard.email = Some(email);
      Ok(PipelineControl::Continue)
    })
  });

  signup_p.on_root("register_identity", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (identity, email, password) = {
        let guard = ctx_data.read();
        (guard.app_state.identity.clone(), guard.email.clone(), guard.password.clone())
      };
      let email = email.ok_or_else(|| AppError::Internal("signup email not derived".to_string()))?;

      let outcome = identity.sign_up(&email, &password).await?;
      info!(user_id = %outcome.user.id, "Identity registered.");

      let mut guard = ctx_data.write();
      guard.user = Some(outcome.user);
      guard.session = outcome.session;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  signup_p.on_root("insert_profile", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (store, profile) = {
        let guard = ctx_data.read();
        let user = guard
          .user
          .as_ref()
          .ok_or_else(|| AppError::Internal("profile insert without identity".to_string()))?;
        (
          guard.app_state.store.clone(),
          UserProfile {
            id: user.id,
            name: guard.name.clone(),
            student_id: guard.student_id.clone(),
          },
        )
      };
      store.insert_profile(&profile).await?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  signup_p.on_root("create_wallet", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (store, user_id) = {
        let guard = ctx_data.read();
        let user_id = guard
          .user
          .as_ref()
          .map(|u| u.id)
          .ok_or_else(|| AppError::Internal("wallet creation without identity".to_string()))?;
        (guard.app_state.store.clone(), user_id)
      };
      store.create_wallet(user_id, 0).await?;
      info!(%user_id, "Wallet created with zero balance.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  registry.register_pipeline(signup_p);
  tracing::info!("Sign-up pipeline registered.");
}
