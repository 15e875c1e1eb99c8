// canteen-server/src/services/mod.rs

//! Clients for the external collaborators, each behind a trait seam.

pub mod identity;
pub mod notifier;
pub mod paymob;
pub mod push;

pub use identity::{AuthSession, IdentityProvider, IdentityUser, SignUpOutcome, SupabaseIdentity};
pub use notifier::{DispatchReport, NotificationDispatcher, PushMessage};
pub use paymob::{CallbackFacts, PaymentGateway, PaymentKeyRequest, PaymobGateway};
pub use push::{PushError, PushTransport, WebPushTransport};
