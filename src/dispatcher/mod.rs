//! Sequential update processing.
//!
//! Both update sources push into one bounded channel; a single loop drains
//! it in arrival order.

mod runner;

pub use runner::{DispatchMessage, Dispatcher};
