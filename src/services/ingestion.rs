//! Donation Ingestion.
//!
//! Validates a request against its mode, resolves the child's region,
//! writes the ledger record and then runs the side effects (aggregate
//! update, referral attribution) in the same call. A side effect failure
//! is logged and never undoes or fails the recorded donation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{IngestionConfig, RetryConfig};
use crate::error::{EngineError, Result};
use crate::interfaces::Directory;
use crate::model::{
    Amount, Donation, DonationMode, DonationRequest, DonationStatus, DonationTarget,
};
use crate::services::aggregate::AggregateUpdater;
use crate::services::referral::{AttributionEngine, AttributionOutcome};
use crate::storage::LedgerStore;
use crate::utils::retry::retry_conflicts;

/// Who gave and to whom, after the mode rules ran.
struct Parties {
    donor_id: Option<String>,
    child_id: Option<String>,
    is_anonymous: bool,
}

/// Records donations and fans out their side effects.
pub struct DonationIngestion {
    ledger: Arc<dyn LedgerStore>,
    directory: Arc<dyn Directory>,
    aggregates: Arc<AggregateUpdater>,
    attribution: Arc<AttributionEngine>,
    config: IngestionConfig,
    retry: RetryConfig,
}

impl DonationIngestion {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        directory: Arc<dyn Directory>,
        aggregates: Arc<AggregateUpdater>,
        attribution: Arc<AttributionEngine>,
        config: IngestionConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            directory,
            aggregates,
            attribution,
            config,
            retry,
        }
    }

    /// Validate and persist a donation as `completed`, then update
    /// aggregates and attribute any referral code.
    ///
    /// Nothing is written when validation fails.
    pub async fn record(&self, request: &DonationRequest, now: DateTime<Utc>) -> Result<Donation> {
        let amount = Amount::parse(&request.amount)?;
        let parties = self.parties(request, amount)?;

        let region_id = match parties.child_id.as_deref() {
            Some(child_id) => {
                let child = self
                    .directory
                    .child(child_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("child", child_id))?;
                Some(child.region_id)
            }
            None => match present(&request.region_id) {
                Some(region_id) => {
                    self.directory
                        .region(region_id)
                        .await?
                        .ok_or_else(|| EngineError::not_found("region", region_id))?;
                    Some(region_id.to_string())
                }
                None => None,
            },
        };

        let donation = Donation {
            id: Uuid::new_v4().to_string(),
            target: if parties.child_id.is_some() {
                DonationTarget::Child
            } else {
                DonationTarget::Region
            },
            donor_id: parties.donor_id,
            child_id: parties.child_id,
            region_id,
            amount,
            currency: self.currency(request)?,
            mode: request.mode,
            is_anonymous: parties.is_anonymous,
            referral_code: present(&request.referral_code).map(str::to_string),
            transaction_id: present(&request.transaction_id).map(str::to_string),
            payment_method: present(&request.payment_method).map(str::to_string),
            message: present(&request.message).map(str::to_string),
            status: DonationStatus::Completed,
            created_at: now,
        };

        let ledger = &self.ledger;
        let record = &donation;
        retry_conflicts(&self.retry, "ledger insert", || async move {
            ledger.insert(record).await
        })
        .await?;

        info!(
            donation = %donation.id,
            mode = %donation.mode,
            amount = %donation.amount,
            currency = %donation.currency,
            child = ?donation.child_id,
            region = ?donation.region_id,
            "Donation recorded"
        );

        self.run_side_effects(&donation, now).await;
        Ok(donation)
    }

    /// Move a completed donation to `failed` and take it out of the
    /// aggregates.
    ///
    /// Calling it again on a failed donation retries the revert, which is a
    /// no-op once it has landed.
    pub async fn mark_failed(&self, donation_id: &str, now: DateTime<Utc>) -> Result<Donation> {
        let mut donation = self.load(donation_id).await?;

        let ledger = &self.ledger;
        let swapped = retry_conflicts(&self.retry, "donation status", || async move {
            ledger
                .transition_status(donation_id, DonationStatus::Completed, DonationStatus::Failed)
                .await
        })
        .await?;
        if swapped {
            donation.status = DonationStatus::Failed;
        } else {
            donation = self.load(donation_id).await?;
            if donation.status != DonationStatus::Failed {
                return Err(EngineError::Validation(format!(
                    "donation {donation_id} is {}, not completed",
                    donation.status.as_str()
                )));
            }
            debug!(donation = %donation_id, "Donation already failed; retrying revert");
        }

        if let Err(e) = self.aggregates.revert(&donation, now).await {
            error!(
                donation = %donation_id,
                error = %e,
                "Failed to revert aggregates; resync the child and region"
            );
            return Err(e.into());
        }

        info!(donation = %donation_id, amount = %donation.amount, "Donation marked failed");
        Ok(donation)
    }

    async fn load(&self, donation_id: &str) -> Result<Donation> {
        self.ledger
            .get(donation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("donation", donation_id))
    }

    fn parties(&self, request: &DonationRequest, amount: Amount) -> Result<Parties> {
        let mode = request.mode;
        if amount.is_zero() {
            return Err(EngineError::Validation(format!(
                "{mode} donations need an amount greater than zero"
            )));
        }

        match mode {
            DonationMode::Quick => Ok(Parties {
                donor_id: None,
                child_id: None,
                is_anonymous: true,
            }),
            DonationMode::Guest => {
                let child_id = required(&request.child_id, "child_id", mode)?;
                Ok(Parties {
                    donor_id: self.config.guest_donor_id.clone(),
                    child_id: Some(child_id.to_string()),
                    is_anonymous: true,
                })
            }
            DonationMode::Standard => {
                let donor_id = required(&request.donor_id, "donor_id", mode)?;
                let child_id = required(&request.child_id, "child_id", mode)?;
                Ok(Parties {
                    donor_id: Some(donor_id.to_string()),
                    child_id: Some(child_id.to_string()),
                    is_anonymous: false,
                })
            }
        }
    }

    fn currency(&self, request: &DonationRequest) -> Result<String> {
        let currency = present(&request.currency).unwrap_or(&self.config.default_currency);
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::Validation(format!(
                "currency must be a 3-letter code, got {currency:?}"
            )));
        }
        Ok(currency.to_ascii_uppercase())
    }

    async fn run_side_effects(&self, donation: &Donation, now: DateTime<Utc>) {
        if let Err(e) = self.aggregates.apply(donation, now).await {
            error!(
                donation = %donation.id,
                error = %e,
                "Aggregate update failed; donation kept"
            );
        }

        let Some(code) = donation.referral_code.as_deref() else {
            return;
        };
        // the guest sentinel is not a stable identity to key a referral on
        let donor = donation
            .donor_id
            .as_deref()
            .filter(|donor| self.config.guest_donor_id.as_deref() != Some(*donor));

        match self
            .attribution
            .attribute_donation(code, donor, donation.amount, now)
            .await
        {
            Ok(AttributionOutcome::Attributed { tracking_id, .. }) => {
                debug!(donation = %donation.id, tracking = %tracking_id, "Referral attributed");
            }
            Ok(AttributionOutcome::Rejected(reason)) => {
                warn!(
                    donation = %donation.id,
                    code = %code,
                    reason = reason.as_str(),
                    "Referral attribution rejected"
                );
            }
            Err(e) => {
                error!(
                    donation = %donation.id,
                    code = %code,
                    error = %e,
                    "Referral attribution failed; donation kept"
                );
            }
        }
    }
}

/// A caller-supplied field, treating blank strings as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &str, mode: DonationMode) -> Result<&'a str> {
    present(value)
        .ok_or_else(|| EngineError::Validation(format!("{mode} donations require {field}")))
}
