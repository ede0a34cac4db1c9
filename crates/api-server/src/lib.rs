#![warn(clippy::unwrap_used)]

pub mod auth_rest;
pub mod points_rest;
pub mod rest;
pub mod server;
pub mod session;

pub use server::ApiServer;
pub use session::SessionStore;
