pub mod catalog;
mod callable;
pub mod resolve;
pub mod sign;

pub use callable::*;
