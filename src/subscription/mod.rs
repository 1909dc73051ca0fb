pub mod event;
pub mod machine;

pub use event::{BillingEvent, EventKind, EventParseError, SubscriptionSnapshot};
pub use machine::{apply, Transition, TransitionError};
