pub mod handlers;
pub mod services;

pub use services::{HealthService, Unhealthy, HEALTHY, UNHEALTHY};
