// canteen-server/src/services/notifier.rs

use crate::errors::{AppError, Result};
use crate::services::push::{PushError, PushTransport};
use crate::store::LedgerStore;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// The JSON the service worker turns into a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
  pub title: String,
  pub body: String,
  pub icon: String,
}

impl PushMessage {
  pub fn order_ready(display_id: i64, icon: &str) -> Self {
    Self {
      title: "طلبك جاهز!".to_string(),
      body: format!("طلبك رقم #{} جاهز للاستلام.", display_id),
      icon: icon.to_string(),
    }
  }

  pub fn order_rejected(display_id: i64, reason: &str, icon: &str) -> Self {
    Self {
      title: "تم رفض طلبك".to_string(),
      body: format!("نأسف، تم رفض طلبك رقم #{}. السبب: {}", display_id, reason),
      icon: icon.to_string(),
    }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
  pub delivered: usize,
  pub pruned: usize,
  pub failed: usize,
}

/// Fans a message out to every endpoint a user registered.
pub struct NotificationDispatcher {
  store: Arc<dyn LedgerStore>,
  transport: Arc<dyn PushTransport>,
}

impl NotificationDispatcher {
  pub fn new(store: Arc<dyn LedgerStore>, transport: Arc<dyn PushTransport>) -> Self {
    Self { store, transport }
  }

  /// Sends to all endpoints concurrently. One endpoint failing never stops
  /// delivery to the others; gone endpoints are deleted.
  #[instrument(name = "notifier::notify", skip(self, message), fields(title = %message.title), err(Display))]
  pub async fn notify(&self, user_id: Uuid, message: &PushMessage) -> Result<DispatchReport> {
    let subscriptions = self.store.subscriptions_for_user(user_id).await?;
    let mut report = DispatchReport::default();
    if subscriptions.is_empty() {
      debug!("User has no push subscriptions.");
      return Ok(report);
    }

    let payload = serde_json::to_vec(message).map_err(|e| AppError::Internal(format!("push payload: {}", e)))?;
    let transport = &self.transport;
    let payload = &payload;
    let outcomes = join_all(
      subscriptions
        .iter()
        .map(|subscription| async move { (subscription, transport.send(subscription, payload).await) }),
    )
    .await;

    for (subscription, outcome) in outcomes {
      match outcome {
        Ok(()) => report.delivered += 1,
        Err(PushError::Gone) => match self.store.delete_subscription(&subscription.endpoint, None).await {
          Ok(_) => {
            info!(endpoint = %subscription.endpoint, "Pruned expired push subscription.");
            report.pruned += 1;
          }
          Err(e) => {
            warn!(endpoint = %subscription.endpoint, error = %e, "Failed to prune expired push subscription.");
            report.failed += 1;
          }
        },
        Err(PushError::Delivery(reason)) => {
          warn!(endpoint = %subscription.endpoint, %reason, "Push delivery failed.");
          report.failed += 1;
        }
      }
    }
    info!(?report, "Notification dispatched.");
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::PushMessage;

  #[test]
  fn localized_texts() {
    let ready = PushMessage::order_ready(1042, "/icon-192.png");
    assert_eq!(ready.title, "طلبك جاهز!");
    assert_eq!(ready.body, "طلبك رقم #1042 جاهز للاستلام.");

    let rejected = PushMessage::order_rejected(7, "نفدت الكمية", "/i.png");
    assert_eq!(rejected.title, "تم رفض طلبك");
    assert_eq!(rejected.body, "نأسف، تم رفض طلبك رقم #7. السبب: نفدت الكمية");
    assert_eq!(rejected.icon, "/i.png");
  }
}
