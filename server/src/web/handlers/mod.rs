// canteen-server/src/web/handlers/mod.rs

pub mod auth_handlers;
pub mod dashboard_handlers;
pub mod menu_handlers;
pub mod order_handlers;
pub mod payment_handlers;
pub mod push_handlers;
