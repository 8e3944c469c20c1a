//! Child and region directory interface.

use async_trait::async_trait;
use serde::Deserialize;

/// Result type for directory lookups.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Errors from a directory or resolver backend.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Directory returned invalid data: {0}")]
    InvalidData(String),
}

/// A sponsored child as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChildRecord {
    pub id: String,
    pub region_id: String,
    #[serde(default)]
    pub school: Option<String>,
}

/// A region as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionRecord {
    pub id: String,
    pub name: String,
}

/// Lookup of children and regions owned by another service.
///
/// Implementations:
/// - `StaticDirectory`: configuration-seeded, in-process
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a child. `None` when the child is unknown.
    async fn child(&self, child_id: &str) -> Result<Option<ChildRecord>>;

    /// Look up a region. `None` when the region is unknown.
    async fn region(&self, region_id: &str) -> Result<Option<RegionRecord>>;
}
