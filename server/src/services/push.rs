// canteen-server/src/services/push.rs

//! Web Push delivery. Payloads are encrypted and VAPID-signed with the
//! `web-push` crate and posted to the push service with `reqwest`.

use crate::config::PushConfig;
use crate::errors::{AppError, Result};
use crate::models::PushSubscription;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

/// How long the push service may hold an undelivered message, in seconds.
const PUSH_TTL_SECS: u32 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum PushError {
  /// The push service no longer knows the endpoint; it should be deleted.
  #[error("push endpoint is gone")]
  Gone,

  #[error("push delivery failed: {0}")]
  Delivery(String),
}

#[async_trait]
pub trait PushTransport: Send + Sync {
  async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> std::result::Result<(), PushError>;
}

pub struct WebPushTransport {
  http: reqwest::Client,
  vapid_private_key: String,
  subject: String,
}

impl WebPushTransport {
  pub fn new(config: &PushConfig, timeout: Duration) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Failed to build push HTTP client: {}", e)))?;
    Ok(Self {
      http,
      vapid_private_key: config.vapid_private_key.clone(),
      subject: config.subject.clone(),
    })
  }
}

fn delivery<E: std::fmt::Display>(e: E) -> PushError {
  PushError::Delivery(e.to_string())
}

#[async_trait]
impl PushTransport for WebPushTransport {
  #[instrument(name = "push::send", skip_all, err(Display))]
  async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> std::result::Result<(), PushError> {
    let info = SubscriptionInfo::new(
      &subscription.endpoint,
      &subscription.keys.p256dh,
      &subscription.keys.auth,
    );

    let mut signature =
      VapidSignatureBuilder::from_base64(&self.vapid_private_key, web_push::URL_SAFE_NO_PAD, &info)
        .map_err(delivery)?;
    signature.add_claim("sub", self.subject.as_str());
    let signature = signature.build().map_err(delivery)?;

    let mut builder = WebPushMessageBuilder::new(&info);
    builder.set_payload(ContentEncoding::Aes128Gcm, payload);
    builder.set_vapid_signature(signature);
    builder.set_ttl(PUSH_TTL_SECS);
    let message = builder.build().map_err(delivery)?;

    let mut request = self
      .http
      .post(message.endpoint.to_string())
      .header("TTL", message.ttl.to_string());
    let body = match message.payload {
      Some(encrypted) => {
        request = request
          .header("Content-Encoding", "aes128gcm")
          .header("Content-Type", "application/octet-stream");
        for (name, value) in encrypted.crypto_headers {
          request = request.header(name, value);
        }
        encrypted.content
      }
      None => Vec::new(),
    };

    let response = request.body(body).send().await.map_err(delivery)?;
    match response.status() {
      s if s.is_success() => Ok(()),
      StatusCode::GONE | StatusCode::NOT_FOUND => Err(PushError::Gone),
      s => Err(PushError::Delivery(format!("push service answered {}", s))),
    }
  }
}
