pub(crate) mod json;
pub mod signature;
pub mod tenant;

pub use json::*;
pub use tenant::{tenant_id, TENANT_HEADER};
