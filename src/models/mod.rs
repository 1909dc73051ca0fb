mod plan;
mod subscription;
mod tier;

pub use plan::*;
pub use subscription::*;
pub use tier::*;
