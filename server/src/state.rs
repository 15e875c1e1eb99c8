// canteen-server/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::lifecycle::OrderLifecycle;
use crate::pipelines;
use crate::services::{IdentityProvider, NotificationDispatcher, PaymentGateway, PushTransport};
use crate::store::LedgerStore;
use orderflow::Registry;
use std::sync::Arc;

/// Everything a request handler or pipeline step can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn LedgerStore>,
  pub identity: Arc<dyn IdentityProvider>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub notifier: Arc<NotificationDispatcher>,
  pub registry: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the collaborators together and registers every pipeline.
  pub fn new(
    config: AppConfig,
    store: Arc<dyn LedgerStore>,
    identity: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn PaymentGateway>,
    push: Arc<dyn PushTransport>,
  ) -> Self {
    let notifier = Arc::new(NotificationDispatcher::new(store.clone(), push));
    let registry = Arc::new(Registry::<AppError>::new());
    pipelines::register_all_pipelines(&registry);
    Self {
      store,
      identity,
      gateway,
      notifier,
      registry,
      config: Arc::new(config),
    }
  }

  pub fn lifecycle(&self) -> OrderLifecycle {
    OrderLifecycle::new(self.clone())
  }
}
