//! Middleware for the planning server

mod admin;

pub use admin::{AdminKeyQuery, admin_middleware};
