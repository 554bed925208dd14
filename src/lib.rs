//! User-management service: health endpoint over a Postgres-backed user store.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod health;
pub mod logging;
pub mod response;
pub mod state;
pub mod users;
