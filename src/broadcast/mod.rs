pub mod broadcaster;
pub mod subscriptions;

pub use broadcaster::{BroadcastReport, Broadcaster, Frame, SubscriberId};
pub use subscriptions::{Subscription, SubscriptionManager};
