// canteen-server/src/lib.rs

//! Campus canteen ordering service: wallet and card checkout, order status
//! tracking for staff, and push notifications to students.

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
