//! Static directory seeded from configuration.
//!
//! ```yaml
//! directory:
//!   regions:
//!     - { id: central, name: Central }
//!   children:
//!     - { id: child-1, region_id: central, school: Hillside Primary }
//!   referral_codes:
//!     ALICE2024: user-alice
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::DirectoryConfig;
use crate::interfaces::directory::Result;
use crate::interfaces::{ChildRecord, Directory, ReferralCodeResolver, RegionRecord};

/// In-memory directory and referral code resolver.
///
/// Entries are loaded from [`DirectoryConfig`] or registered at runtime via
/// `register_child` / `register_region` / `register_referral_code`.
#[derive(Default)]
pub struct StaticDirectory {
    children: RwLock<HashMap<String, ChildRecord>>,
    regions: RwLock<HashMap<String, RegionRecord>>,
    referral_codes: RwLock<HashMap<String, String>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory holding everything in `config`.
    pub fn from_config(config: &DirectoryConfig) -> Self {
        let regions: HashMap<_, _> = config
            .regions
            .iter()
            .map(|region| (region.id.clone(), region.clone()))
            .collect();
        let children: HashMap<_, _> = config
            .children
            .iter()
            .map(|child| (child.id.clone(), child.clone()))
            .collect();

        info!(
            regions = regions.len(),
            children = children.len(),
            referral_codes = config.referral_codes.len(),
            "Static directory initialized from configuration"
        );

        Self {
            children: RwLock::new(children),
            regions: RwLock::new(regions),
            referral_codes: RwLock::new(config.referral_codes.clone()),
        }
    }

    pub async fn register_region(&self, id: &str, name: &str) {
        debug!(region = %id, "Registered region");
        self.regions.write().await.insert(
            id.to_string(),
            RegionRecord {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub async fn register_child(&self, id: &str, region_id: &str, school: Option<&str>) {
        debug!(child = %id, region = %region_id, "Registered child");
        self.children.write().await.insert(
            id.to_string(),
            ChildRecord {
                id: id.to_string(),
                region_id: region_id.to_string(),
                school: school.map(str::to_string),
            },
        );
    }

    pub async fn register_referral_code(&self, code: &str, user_id: &str) {
        debug!(code = %code, user = %user_id, "Registered referral code");
        self.referral_codes
            .write()
            .await
            .insert(code.to_string(), user_id.to_string());
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn child(&self, child_id: &str) -> Result<Option<ChildRecord>> {
        Ok(self.children.read().await.get(child_id).cloned())
    }

    async fn region(&self, region_id: &str) -> Result<Option<RegionRecord>> {
        Ok(self.regions.read().await.get(region_id).cloned())
    }
}

#[async_trait]
impl ReferralCodeResolver for StaticDirectory {
    async fn resolve_referral_code(&self, code: &str) -> Result<Option<String>> {
        Ok(self.referral_codes.read().await.get(code).cloned())
    }
}
