//! Path-prefix feature gating.
//!
//! Each configured rule ties a route prefix to a catalog feature. A request
//! under a gated prefix only reaches its handler when the tenant named in
//! `x-tenant-id` currently holds the feature; the resolved entitlement is
//! then left in the request extensions for the handler.

mod gate;
mod gate_middleware;

pub use gate::*;
pub use gate_middleware::*;

use crate::configuration::GateSettings;

pub(crate) fn matching_rule<'a>(rules: &'a [GateSettings], path: &str) -> Option<&'a GateSettings> {
    rules
        .iter()
        .filter(|rule| covers(&rule.prefix, path))
        .max_by_key(|rule| rule.prefix.len())
}

fn covers(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
