// canteen-server/src/main.rs

use canteen_server::config::{AppConfig, LogFormat, StoreBackend};
use canteen_server::services::{
  IdentityProvider, PaymentGateway, PaymobGateway, PushTransport, SupabaseIdentity, WebPushTransport,
};
use canteen_server::state::AppState;
use canteen_server::store::{InMemoryLedger, LedgerStore, PgLedger};
use canteen_server::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
  match config.store_backend {
    StoreBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the postgres backend")?;
      let pool = PgPool::connect(url).await.context("Failed to connect to the database")?;
      tracing::info!("Successfully connected to the database.");
      let ledger = PgLedger::new(pool);
      if config.run_migrations {
        ledger.run_migrations().await.context("Failed to run migrations")?;
        tracing::info!("Database migrations applied.");
      }
      Ok(Arc::new(ledger))
    }
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory store; all data is lost on restart.");
      Ok(Arc::new(InMemoryLedger::new()))
    }
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env().context("Configuration error")?;
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting canteen server...");

  let store = build_store(&app_config).await?;
  let identity: Arc<dyn IdentityProvider> = Arc::new(SupabaseIdentity::new(
    app_config.supabase.clone(),
    app_config.gateway_timeout,
  )?);
  let gateway: Arc<dyn PaymentGateway> = Arc::new(PaymobGateway::new(
    app_config.paymob.clone(),
    app_config.gateway_timeout,
  )?);
  let push: Arc<dyn PushTransport> = Arc::new(WebPushTransport::new(&app_config.push, app_config.gateway_timeout)?);

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let app_state = AppState::new(app_config, store, identity, gateway, push);

  tracing::info!("Binding server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;
  Ok(())
}
