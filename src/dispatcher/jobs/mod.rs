//! Built-in job implementations

pub mod health;
pub mod http;
pub mod retention;

pub use health::HealthCheckJob;
pub use http::HttpJob;
pub use retention::RetentionJob;
