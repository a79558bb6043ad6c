//! Where the list of URLs to check comes from

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::HealthCheckError;
use crate::prober::ProbeTarget;

/// Supplies the current set of probe targets
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn load(&self) -> Result<Vec<ProbeTarget>, HealthCheckError>;
}

/// JSON array of targets on disk, re-read on every run
///
/// ```json
/// [
///   {"url": "https://oal.ca.gov/news", "category": "news_page", "owner_tag": "CA",
///    "title": "Office of Administrative Law"}
/// ]
/// ```
#[derive(Debug, Clone)]
pub struct FileTargetSource {
    path: PathBuf,
}

impl FileTargetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TargetSource for FileTargetSource {
    async fn load(&self) -> Result<Vec<ProbeTarget>, HealthCheckError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            HealthCheckError::Targets(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let targets: Vec<ProbeTarget> = serde_json::from_str(&content).map_err(|e| {
            HealthCheckError::Targets(format!("invalid target list {}: {}", self.path.display(), e))
        })?;

        debug!("loaded {} targets from {}", targets.len(), self.path.display());
        Ok(targets)
    }
}

/// Fixed in-memory target list
#[derive(Debug, Clone, Default)]
pub struct StaticTargetSource(pub Vec<ProbeTarget>);

#[async_trait]
impl TargetSource for StaticTargetSource {
    async fn load(&self) -> Result<Vec<ProbeTarget>, HealthCheckError> {
        Ok(self.0.clone())
    }
}
