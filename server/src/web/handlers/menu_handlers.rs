// canteen-server/src/web/handlers/menu_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::{debug, instrument};

use crate::errors::AppError;
use crate::models::menu_item;
use crate::state::AppState;

/// The whole menu grouped by category; unavailable items are included and flagged.
#[instrument(name = "handler::menu", skip(app_state))]
pub async fn get_menu_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let items = app_state.store.menu().await?;
  debug!(count = items.len(), "Menu loaded.");
  Ok(HttpResponse::Ok().json(menu_item::group_by_category(items)))
}
