//! Storage backends for rate-limit windows, health history and job runs
//!
//! ## Design
//!
//! - **Trait-based**: one trait per record family, bundled by `StorageBackend`
//! - **Async**: all operations are async for use from handlers and jobs
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database, WAL mode, migrations via sqlx
//! - **In-Memory**: no persistence, for tests and storage-less deployments
//!
//! ## Usage
//!
//! ```no_run
//! use compliance_sentinel::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./sentinel.db").await?;
//!     println!("{}", backend.get_stats().await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthLog, HealthStatus, JobRunLog, RateLimitStore, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{HealthCheckRecord, JobRunRow};
