#![warn(clippy::unwrap_used)]

pub mod client;
pub mod endpoints;
pub mod wire;

pub use client::CrmClient;
pub use endpoints::CrmEndpoints;
