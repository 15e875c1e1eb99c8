// canteen-server/src/models/mod.rs
pub mod menu_item;
pub mod money;
pub mod order;
pub mod push_subscription;
pub mod user;

pub use menu_item::MenuItem;
pub use money::Cents;
pub use order::{Order, OrderLine, OrderStatus, PaymentMethod};
pub use push_subscription::{PushSubscription, SubscriptionKeys};
pub use user::UserProfile;
