//! Entitlement resolution and feature gating.
//!
//! An entitlement is never stored. It is recomputed from the subscription
//! and the catalog on every check so a plan change or a lapse takes effect
//! on the next request.

pub mod gate;
pub mod resolver;

pub use gate::{has_feature, require_feature, UpgradeRequired};
pub use resolver::{
    resolve, Access, DenialReason, Entitlement, EntitlementPolicy, EntitlementResolver,
};
