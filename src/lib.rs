pub mod api;
pub mod config;
pub mod dispatcher;
pub mod health;
pub mod notify;
pub mod prober;
pub mod rate_limit;
pub mod sentinel;
pub mod storage;
pub mod util;

pub use sentinel::Sentinel;
