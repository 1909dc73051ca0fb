pub mod catalog;
pub mod entitlement;
pub mod feature;
pub mod health_checks;
pub mod subscription;
pub mod webhook;

pub use health_checks::*;
