//! Static directory configuration.

use std::collections::HashMap;

use serde::Deserialize;

use crate::interfaces::{ChildRecord, RegionRecord};

/// Regions, children and referral codes served by `StaticDirectory`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub regions: Vec<RegionRecord>,
    pub children: Vec<ChildRecord>,
    /// Referral code to referrer user id.
    pub referral_codes: HashMap<String, String>,
}
