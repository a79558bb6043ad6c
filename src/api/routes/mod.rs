//! Route handlers, one module per resource

pub mod health;
pub mod health_check;
pub mod jobs;
pub mod rate_limit;
pub mod tick;
