//! Per-profile login against the broker.
//!
//! A successful login yields an [`Identity`] whose alias scopes note calls on
//! that profile's remote provider.

mod client;
mod error;

pub use client::*;
pub use error::*;
