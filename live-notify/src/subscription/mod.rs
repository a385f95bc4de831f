//! Subscriptions and their persistence.

pub mod registry;
pub mod store;

pub use registry::{
    SharedMonitor, SubscribeOutcome, Subscription, SubscriptionRegistry, UnsubscribeOutcome,
};
pub use store::{KeyValueStore, MemoryKvStore, SUBSCRIPTION_NAMESPACE, SqliteKvStore, StoreError};
