// canteen-server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct SupabaseConfig {
  pub url: String,
  pub api_key: String,
}

impl fmt::Debug for SupabaseConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SupabaseConfig")
      .field("url", &self.url)
      .field("api_key", &REDACTED)
      .finish()
  }
}

#[derive(Clone)]
pub struct PaymobConfig {
  pub base_url: String,
  pub api_key: String,
  pub integration_id: i64,
  pub iframe_id: String,
  pub currency: String,
  /// When set, payment callbacks must carry a matching `hmac` query parameter.
  pub hmac_secret: Option<String>,
}

impl fmt::Debug for PaymobConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PaymobConfig")
      .field("base_url", &self.base_url)
      .field("api_key", &REDACTED)
      .field("integration_id", &self.integration_id)
      .field("iframe_id", &self.iframe_id)
      .field("currency", &self.currency)
      .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| REDACTED))
      .finish()
  }
}

#[derive(Clone)]
pub struct PushConfig {
  pub vapid_public_key: String,
  pub vapid_private_key: String,
  pub subject: String,
  pub icon_url: String,
}

impl fmt::Debug for PushConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PushConfig")
      .field("vapid_public_key", &self.vapid_public_key)
      .field("vapid_private_key", &REDACTED)
      .field("subject", &self.subject)
      .field("icon_url", &self.icon_url)
      .finish()
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub student_email_domain: String,
  pub supabase: SupabaseConfig,
  pub paymob: PaymobConfig,
  pub gateway_timeout: Duration,
  pub dashboard_password: String,
  pub push: PushConfig,
  pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("store_backend", &self.store_backend)
      .field("database_url", &self.database_url.as_ref().map(|_| REDACTED))
      .field("run_migrations", &self.run_migrations)
      .field("student_email_domain", &self.student_email_domain)
      .field("supabase", &self.supabase)
      .field("paymob", &self.paymob)
      .field("gateway_timeout", &self.gateway_timeout)
      .field("dashboard_password", &REDACTED)
      .field("push", &self.push)
      .field("log_format", &self.log_format)
      .finish()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_source(|var_name| env::var(var_name).ok())
  }

  /// Builds the config from any key lookup. `from_env` passes the process
  /// environment; tests pass a map.
  pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|_| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = get_or("SERVER_PORT", "8080")
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

    let store_backend = match get_or("STORE_BACKEND", "postgres").to_ascii_lowercase().as_str() {
      "postgres" => StoreBackend::Postgres,
      "memory" => StoreBackend::Memory,
      other => return Err(AppError::Config(format!("Invalid STORE_BACKEND '{}'", other))),
    };
    let database_url = match store_backend {
      StoreBackend::Postgres => Some(get_env("DATABASE_URL")?),
      StoreBackend::Memory => get_env("DATABASE_URL").ok(),
    };
    let run_migrations = get_or("RUN_MIGRATIONS", "false")
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid RUN_MIGRATIONS value: {}", e)))?;

    let supabase = SupabaseConfig {
      url: get_env("SUPABASE_URL")?.trim_end_matches('/').to_string(),
      api_key: get_env("SUPABASE_KEY")?,
    };
    let student_email_domain = get_or("STUDENT_EMAIL_DOMAIN", "chilli-app.io");

    let paymob = PaymobConfig {
      base_url: get_or("PAYMOB_BASE_URL", "https://accept.paymob.com")
        .trim_end_matches('/')
        .to_string(),
      api_key: get_env("PAYMOB_API_KEY")?,
      integration_id: get_env("PAYMOB_INTEGRATION_ID")?
        .parse::<i64>()
        .map_err(|e| AppError::Config(format!("Invalid PAYMOB_INTEGRATION_ID: {}", e)))?,
      iframe_id: get_env("PAYMOB_IFRAME_ID")?,
      currency: get_or("PAYMOB_CURRENCY", "EGP"),
      hmac_secret: get_env("PAYMOB_HMAC_SECRET").ok(),
    };
    let gateway_timeout = get_or("GATEWAY_TIMEOUT_SECS", "15")
      .parse::<u64>()
      .map(Duration::from_secs)
      .map_err(|e| AppError::Config(format!("Invalid GATEWAY_TIMEOUT_SECS: {}", e)))?;

    let dashboard_password = get_env("DASHBOARD_PASSWORD")?;

    let push = PushConfig {
      vapid_public_key: get_env("VAPID_PUBLIC_KEY")?,
      vapid_private_key: get_env("VAPID_PRIVATE_KEY")?,
      subject: get_or("VAPID_SUBJECT", "mailto:admin@example.com"),
      icon_url: get_or("PUSH_ICON_URL", "/icon-192.png"),
    };

    let log_format = match get_or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      _ => LogFormat::Pretty,
    };

    let config = Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      run_migrations,
      student_email_domain,
      supabase,
      paymob,
      gateway_timeout,
      dashboard_password,
      push,
      log_format,
    };
    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  /// The synthetic login e-mail the identity provider knows a student by.
  pub fn student_email(&self, student_id: &str) -> String {
    format!("{}@{}", student_id, self.student_email_domain)
  }
}
