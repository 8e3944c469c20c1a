//! Abstract interfaces for external collaborators.
//!
//! These traits define the contracts for:
//! - Directory lookups (children, regions, schools)
//! - Referral code resolution (code to referrer identity)
//!
//! Storage contracts live in [`crate::storage`].

pub mod directory;
pub mod referral_resolver;

pub use directory::{ChildRecord, Directory, DirectoryError, RegionRecord};
pub use referral_resolver::ReferralCodeResolver;
