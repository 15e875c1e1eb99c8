// canteen-server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::lifecycle::CallbackOutcome;
use crate::state::AppState;

/// Callback bodies past this size are acknowledged without being processed.
pub const MAX_CALLBACK_BYTES: usize = 1024 * 1024;

#[derive(Deserialize, Debug)]
struct CallbackQuery {
  hmac: Option<String>,
}

/// Gateway webhook. Always acknowledged with 200 so the gateway does not
/// retry; what happened is only visible in the logs.
///
/// The body is read from the raw payload stream rather than through the
/// `Bytes` extractor, whose size limit would answer 413 on its own.
#[instrument(name = "handler::confirm_paymob_callback", skip(app_state, req, payload))]
pub async fn confirm_paymob_callback_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  payload: web::Payload,
) -> HttpResponse {
  let signature = web::Query::<CallbackQuery>::from_query(req.query_string())
    .map(|q| q.into_inner().hmac)
    .unwrap_or_default();

  let body = match read_capped(payload, MAX_CALLBACK_BYTES).await {
    Some(body) => body,
    None => return acknowledged(),
  };

  let callback = match serde_json::from_slice::<Value>(&body) {
    Ok(payload) => payload,
    Err(e) => {
      warn!(error = %e, "Payment callback body is not JSON.");
      return acknowledged();
    }
  };

  match app_state.lifecycle().confirm_payment_callback(callback, signature).await {
    CallbackOutcome::Confirmed { display_id } => info!(display_id, "Order paid by card."),
    CallbackOutcome::AlreadyConfirmed { display_id } => info!(display_id, "Duplicate payment callback."),
    CallbackOutcome::Ignored(reason) => info!(%reason, "Payment callback made no change."),
  }
  acknowledged()
}

/// Collects the request body. `None` when the stream fails or grows past `limit`.
async fn read_capped(mut payload: web::Payload, limit: usize) -> Option<web::BytesMut> {
  let mut body = web::BytesMut::new();
  while let Some(chunk) = payload.next().await {
    let chunk = match chunk {
      Ok(chunk) => chunk,
      Err(e) => {
        warn!(error = %e, "Failed to read payment callback body.");
        return None;
      }
    };
    if body.len() + chunk.len() > limit {
      warn!(limit, "Payment callback body is too large; ignoring it.");
      return None;
    }
    body.extend_from_slice(&chunk);
  }
  Some(body)
}

fn acknowledged() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "received": true }))
}
