//! Donation records and ledger read models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, ParseEnumError, PeriodKind};

/// Donor identity mode of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationMode {
    /// Anonymous one-off gift to the general fund. No donor, no child.
    Quick,
    /// Gift to a specific child from someone without an account.
    Guest,
    /// Gift to a specific child from a signed-in donor.
    Standard,
}

impl DonationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationMode::Quick => "quick",
            DonationMode::Guest => "guest",
            DonationMode::Standard => "standard",
        }
    }
}

impl fmt::Display for DonationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(DonationMode::Quick),
            "guest" => Ok(DonationMode::Guest),
            "standard" => Ok(DonationMode::Standard),
            other => Err(ParseEnumError::new("donation mode", other)),
        }
    }
}

/// Lifecycle status of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Completed => "completed",
            DonationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DonationStatus::Pending),
            "completed" => Ok(DonationStatus::Completed),
            "failed" => Ok(DonationStatus::Failed),
            other => Err(ParseEnumError::new("donation status", other)),
        }
    }
}

/// What the donor chose to give to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationTarget {
    Child,
    Region,
}

impl DonationTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationTarget::Child => "child",
            DonationTarget::Region => "region",
        }
    }
}

impl FromStr for DonationTarget {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "child" => Ok(DonationTarget::Child),
            "region" => Ok(DonationTarget::Region),
            other => Err(ParseEnumError::new("donation target", other)),
        }
    }
}

/// An immutable ledger record.
///
/// Only `status` ever changes after insertion, and only from
/// `Completed` to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub donor_id: Option<String>,
    pub child_id: Option<String>,
    pub region_id: Option<String>,
    pub amount: Amount,
    pub currency: String,
    pub mode: DonationMode,
    pub is_anonymous: bool,
    pub referral_code: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub message: Option<String>,
    pub target: DonationTarget,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    pub fn is_completed(&self) -> bool {
        self.status == DonationStatus::Completed
    }
}

/// Caller input to `record_donation`.
///
/// The amount is kept as text so that malformed input is reported as an
/// amount error rather than lost at a deserialization boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRequest {
    pub mode: DonationMode,
    pub donor_id: Option<String>,
    pub child_id: Option<String>,
    pub region_id: Option<String>,
    pub amount: String,
    pub currency: Option<String>,
    pub referral_code: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub message: Option<String>,
}

impl DonationRequest {
    fn new(mode: DonationMode, amount: impl Into<String>) -> Self {
        Self {
            mode,
            donor_id: None,
            child_id: None,
            region_id: None,
            amount: amount.into(),
            currency: None,
            referral_code: None,
            payment_method: None,
            transaction_id: None,
            message: None,
        }
    }

    pub fn quick(amount: impl Into<String>) -> Self {
        Self::new(DonationMode::Quick, amount)
    }

    pub fn guest(child_id: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            child_id: Some(child_id.into()),
            ..Self::new(DonationMode::Guest, amount)
        }
    }

    pub fn standard(
        donor_id: impl Into<String>,
        child_id: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            donor_id: Some(donor_id.into()),
            child_id: Some(child_id.into()),
            ..Self::new(DonationMode::Standard, amount)
        }
    }

    pub fn with_region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    pub fn with_referral_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = Some(code.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_payment(
        mut self,
        method: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        self.payment_method = Some(method.into());
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Sum, count and distinct-donor count over a set of completed donations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total_amount: Amount,
    pub donation_count: i64,
    pub unique_donors: i64,
}

/// One group of a ledger group-by: an entity and what it gave or received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTotal {
    pub entity_id: String,
    pub total_amount: Amount,
    pub donation_count: i64,
}

/// Denormalized running counter for one child or region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTotal {
    pub entity_id: String,
    pub total_amount: Amount,
    pub donation_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Per-region, per-bucket summary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationSummary {
    pub region_id: String,
    pub period: PeriodKind,
    pub bucket_date: NaiveDate,
    pub total_amount: Amount,
    pub donation_count: i64,
    pub unique_donors: i64,
    pub updated_at: DateTime<Utc>,
}
