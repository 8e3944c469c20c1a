//! Referral code resolution interface.

use async_trait::async_trait;

use super::directory::Result;

/// Maps a shareable referral code to the user who owns it.
#[async_trait]
pub trait ReferralCodeResolver: Send + Sync {
    /// Resolve `code`. `None` when no user owns it.
    async fn resolve_referral_code(&self, code: &str) -> Result<Option<String>>;
}
