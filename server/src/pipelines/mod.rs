// canteen-server/src/pipelines/mod.rs

//! Every multi-step operation of the service is a registered pipeline.

use crate::errors::AppError;
use orderflow::Registry;

pub mod common_steps;
pub mod contexts;

pub mod card_payment_pipeline;
pub mod payment_callback_pipeline;
pub mod signup_pipeline;
pub mod status_pipeline;
pub mod wallet_order_pipeline;

/// Registers all pipelines with the registry. Called once while building `AppState`.
pub fn register_all_pipelines(registry: &Registry<AppError>) {
  tracing::info!("Registering pipelines...");

  signup_pipeline::register_signup_pipeline(registry);
  wallet_order_pipeline::register_wallet_order_pipeline(registry);
  card_payment_pipeline::register_card_payment_pipeline(registry);
  payment_callback_pipeline::register_payment_callback_pipeline(registry);
  status_pipeline::register_status_pipelines(registry);

  tracing::info!("All application pipelines registered.");
}
