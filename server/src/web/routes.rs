// canteen-server/src/web/routes.rs

use crate::web::handlers::{
  auth_handlers, dashboard_handlers, menu_handlers, order_handlers, payment_handlers, push_handlers,
};
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      // Students
      .route("/signup", web::post().to(auth_handlers::signup_handler))
      .route("/login", web::post().to(auth_handlers::login_handler))
      .route("/menu", web::get().to(menu_handlers::get_menu_handler))
      .route("/user-details", web::get().to(order_handlers::user_details_handler))
      .route("/orders", web::get().to(order_handlers::list_orders_handler))
      .route(
        "/order-status/{display_id}",
        web::get().to(order_handlers::order_status_handler),
      )
      .route(
        "/process-wallet-order",
        web::post().to(order_handlers::process_wallet_order_handler),
      )
      .route(
        "/start-paymob-payment",
        web::post().to(order_handlers::start_paymob_payment_handler),
      )
      // Gateway webhook
      .route(
        "/confirm-paymob-callback",
        web::post().to(payment_handlers::confirm_paymob_callback_handler),
      )
      // Push
      .route("/vapid-public-key", web::get().to(push_handlers::vapid_public_key_handler))
      .route("/subscribe", web::post().to(push_handlers::subscribe_handler))
      .route("/unsubscribe", web::post().to(push_handlers::unsubscribe_handler))
      // Staff dashboard
      .route("/all-orders", web::get().to(dashboard_handlers::all_orders_handler))
      .route(
        "/update-order-status",
        web::post().to(dashboard_handlers::update_order_status_handler),
      )
      .route("/reject-order", web::post().to(dashboard_handlers::reject_order_handler))
      .route("/find-user", web::post().to(dashboard_handlers::find_user_handler))
      .route("/charge-wallet", web::post().to(dashboard_handlers::charge_wallet_handler)),
  );
}
