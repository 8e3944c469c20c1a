//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! Amounts are stored as integer minor units; timestamps as UTC RFC3339 text;
//! bucket dates as `YYYY-MM-DD` text.

use sea_query::Iden;

/// Donations table schema.
#[derive(Iden, Clone, Copy)]
pub enum Donations {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "donor_id"]
    DonorId,
    #[iden = "child_id"]
    ChildId,
    #[iden = "region_id"]
    RegionId,
    #[iden = "amount_minor"]
    AmountMinor,
    #[iden = "currency"]
    Currency,
    #[iden = "mode"]
    Mode,
    #[iden = "is_anonymous"]
    IsAnonymous,
    #[iden = "referral_code"]
    ReferralCode,
    #[iden = "transaction_id"]
    TransactionId,
    #[iden = "payment_method"]
    PaymentMethod,
    #[iden = "message"]
    Message,
    #[iden = "target"]
    Target,
    #[iden = "status"]
    Status,
    #[iden = "created_at"]
    CreatedAt,
}

/// Child running totals schema.
#[derive(Iden, Clone, Copy)]
pub enum ChildTotals {
    Table,
    #[iden = "child_id"]
    ChildId,
    #[iden = "total_received_minor"]
    TotalReceivedMinor,
    #[iden = "donation_count"]
    DonationCount,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Region running totals schema.
#[derive(Iden, Clone, Copy)]
pub enum RegionTotals {
    Table,
    #[iden = "region_id"]
    RegionId,
    #[iden = "total_donated_minor"]
    TotalDonatedMinor,
    #[iden = "donation_count"]
    DonationCount,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Period summary schema.
#[derive(Iden, Clone, Copy)]
pub enum DonationSummaries {
    Table,
    #[iden = "region_id"]
    RegionId,
    #[iden = "period"]
    Period,
    #[iden = "bucket_date"]
    BucketDate,
    #[iden = "total_minor"]
    TotalMinor,
    #[iden = "donation_count"]
    DonationCount,
    #[iden = "unique_donors"]
    UniqueDonors,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Aggregate application markers schema.
#[derive(Iden, Clone, Copy)]
pub enum AggregateApplications {
    Table,
    #[iden = "donation_id"]
    DonationId,
    #[iden = "direction"]
    Direction,
    #[iden = "applied_at"]
    AppliedAt,
}

/// Referral tracking schema.
#[derive(Iden, Clone, Copy)]
pub enum ReferralTracking {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "referrer_id"]
    ReferrerId,
    #[iden = "referred_id"]
    ReferredId,
    #[iden = "referral_code"]
    ReferralCode,
    #[iden = "status"]
    Status,
    #[iden = "click_count"]
    ClickCount,
    #[iden = "first_clicked_at"]
    FirstClickedAt,
    #[iden = "registered_at"]
    RegisteredAt,
    #[iden = "first_donation_at"]
    FirstDonationAt,
    #[iden = "total_donations_minor"]
    TotalDonationsMinor,
    #[iden = "donation_count"]
    DonationCount,
    #[iden = "source"]
    Source,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
    #[iden = "version"]
    Version,
}

/// Referral rewards schema.
#[derive(Iden, Clone, Copy)]
pub enum ReferralRewards {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "user_id"]
    UserId,
    #[iden = "tracking_id"]
    TrackingId,
    #[iden = "reward_type"]
    RewardType,
    #[iden = "value_minor"]
    ValueMinor,
    #[iden = "description"]
    Description,
    #[iden = "status"]
    Status,
    #[iden = "awarded_at"]
    AwardedAt,
    #[iden = "redeemed_at"]
    RedeemedAt,
    #[iden = "expires_at"]
    ExpiresAt,
}

/// Per-referrer counters schema.
#[derive(Iden, Clone, Copy)]
pub enum ReferrerTotals {
    Table,
    #[iden = "user_id"]
    UserId,
    #[iden = "referral_count"]
    ReferralCount,
    #[iden = "referral_donations_minor"]
    ReferralDonationsMinor,
}

/// Leaderboard entries schema.
#[derive(Iden, Clone, Copy)]
pub enum LeaderboardEntries {
    Table,
    #[iden = "kind"]
    Kind,
    #[iden = "period"]
    Period,
    #[iden = "bucket_date"]
    BucketDate,
    #[iden = "entity_id"]
    EntityId,
    #[iden = "entity_name"]
    EntityName,
    #[iden = "rank"]
    Rank,
    #[iden = "rank_change"]
    RankChange,
    #[iden = "total_minor"]
    TotalMinor,
    #[iden = "donation_count"]
    DonationCount,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQL for creating the donations table.
pub const CREATE_DONATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS donations (
    id TEXT PRIMARY KEY NOT NULL,
    donor_id TEXT,
    child_id TEXT,
    region_id TEXT,
    amount_minor INTEGER NOT NULL CHECK (amount_minor >= 0),
    currency TEXT NOT NULL,
    mode TEXT NOT NULL,
    is_anonymous INTEGER NOT NULL DEFAULT 0,
    referral_code TEXT,
    transaction_id TEXT,
    payment_method TEXT,
    message TEXT,
    target TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_donations_donor ON donations(donor_id);
CREATE INDEX IF NOT EXISTS idx_donations_child ON donations(child_id);
CREATE INDEX IF NOT EXISTS idx_donations_region_created ON donations(region_id, created_at);
CREATE INDEX IF NOT EXISTS idx_donations_created ON donations(created_at);
"#;

/// SQL for creating the running totals, summaries and application markers.
pub const CREATE_AGGREGATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS child_totals (
    child_id TEXT PRIMARY KEY NOT NULL,
    total_received_minor INTEGER NOT NULL DEFAULT 0,
    donation_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS region_totals (
    region_id TEXT PRIMARY KEY NOT NULL,
    total_donated_minor INTEGER NOT NULL DEFAULT 0,
    donation_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS donation_summaries (
    region_id TEXT NOT NULL,
    period TEXT NOT NULL,
    bucket_date TEXT NOT NULL,
    total_minor INTEGER NOT NULL DEFAULT 0,
    donation_count INTEGER NOT NULL DEFAULT 0,
    unique_donors INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (region_id, period, bucket_date)
);

CREATE INDEX IF NOT EXISTS idx_summaries_period ON donation_summaries(period, bucket_date);

CREATE TABLE IF NOT EXISTS aggregate_applications (
    donation_id TEXT NOT NULL,
    direction TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    PRIMARY KEY (donation_id, direction)
);
"#;

/// SQL for creating the referral tables.
pub const CREATE_REFERRAL_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS referral_tracking (
    id TEXT PRIMARY KEY NOT NULL,
    referrer_id TEXT NOT NULL,
    referred_id TEXT,
    referral_code TEXT NOT NULL,
    status TEXT NOT NULL,
    click_count INTEGER NOT NULL DEFAULT 0,
    first_clicked_at TEXT,
    registered_at TEXT,
    first_donation_at TEXT,
    total_donations_minor INTEGER NOT NULL DEFAULT 0,
    donation_count INTEGER NOT NULL DEFAULT 0,
    source TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    UNIQUE (referrer_id, referred_id)
);

CREATE INDEX IF NOT EXISTS idx_tracking_code ON referral_tracking(referral_code);
CREATE INDEX IF NOT EXISTS idx_tracking_referred ON referral_tracking(referred_id);

CREATE TABLE IF NOT EXISTS referral_rewards (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    tracking_id TEXT NOT NULL,
    reward_type TEXT NOT NULL,
    value_minor INTEGER NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL,
    awarded_at TEXT,
    redeemed_at TEXT,
    expires_at TEXT,
    UNIQUE (tracking_id, description)
);

CREATE INDEX IF NOT EXISTS idx_rewards_user ON referral_rewards(user_id);

CREATE TABLE IF NOT EXISTS referrer_totals (
    user_id TEXT PRIMARY KEY NOT NULL,
    referral_count INTEGER NOT NULL DEFAULT 0,
    referral_donations_minor INTEGER NOT NULL DEFAULT 0
);
"#;

/// SQL for creating the leaderboard table.
pub const CREATE_LEADERBOARD_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS leaderboard_entries (
    kind TEXT NOT NULL,
    period TEXT NOT NULL,
    bucket_date TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    entity_name TEXT,
    rank INTEGER NOT NULL,
    rank_change INTEGER NOT NULL DEFAULT 0,
    total_minor INTEGER NOT NULL,
    donation_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (kind, period, bucket_date, entity_id)
);
"#;
