//! In-process implementations of the collaborator interfaces.
//!
//! Production deployments put the user and school services behind
//! [`crate::interfaces::Directory`] and
//! [`crate::interfaces::ReferralCodeResolver`]; the static implementation here
//! is seeded from configuration for local runs and tests.

pub mod static_directory;

pub use static_directory::StaticDirectory;
