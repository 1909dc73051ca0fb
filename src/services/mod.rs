pub mod store;
pub mod sync;

pub use store::{InMemorySubscriptionStore, PgSubscriptionStore, StoreError, SubscriptionStore};
pub use sync::{SubscriptionSync, SyncOutcome};
