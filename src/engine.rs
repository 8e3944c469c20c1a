//! The `DonationEngine` facade.
//!
//! Wires the components over one set of stores and reads the clock once
//! per operation, so every bucket computed for a call agrees on "now".

use std::sync::Arc;

use crate::config::{Config, ConfigError, IngestionConfig};
use crate::discovery::StaticDirectory;
use crate::error::{EngineError, Result};
use crate::interfaces::{Directory, ReferralCodeResolver};
use crate::model::{
    Amount, Applicability, Donation, DonationRequest, DonationSummary, GroupTotal, Leaderboard,
    LeaderboardEntry, LeaderboardKind, Milestone, MilestoneProgress, PeriodKind, ReferralStats,
    ReferralTracking, ReferrerLeaderboardEntry, RunningTotal, Totals,
};
use crate::services::{
    AggregateUpdater, AttributionEngine, DonationIngestion, LeaderboardRanker,
    LeaderboardScheduler, MilestoneEvaluator, RecomputeSummary,
};
use crate::storage::{DonationFilter, GroupBy, Stores};
use crate::utils::{Clock, SystemClock};

/// Donation ledger, aggregates, referrals, milestones and leaderboards
/// behind one API.
pub struct DonationEngine {
    stores: Stores,
    ingestion: DonationIngestion,
    aggregates: Arc<AggregateUpdater>,
    attribution: Arc<AttributionEngine>,
    ranker: Arc<LeaderboardRanker>,
    milestones: MilestoneEvaluator,
    clock: Arc<dyn Clock>,
    ingestion_config: IngestionConfig,
}

impl DonationEngine {
    /// Create an engine with the built-in milestone table and wall-clock time.
    pub fn new(
        config: &Config,
        stores: Stores,
        directory: Arc<dyn Directory>,
        resolver: Arc<dyn ReferralCodeResolver>,
    ) -> Self {
        let ignored_donor = config.ingestion.guest_donor_id.clone();

        let aggregates = Arc::new(AggregateUpdater::new(
            stores.ledger.clone(),
            stores.aggregates.clone(),
            ignored_donor.clone(),
            config.retry.clone(),
        ));
        let attribution = Arc::new(AttributionEngine::new(
            stores.referrals.clone(),
            resolver,
            config.retry.clone(),
        ));
        let ranker = Arc::new(LeaderboardRanker::new(
            stores.ledger.clone(),
            stores.leaderboards.clone(),
            directory.clone(),
            ignored_donor,
        ));
        let ingestion = DonationIngestion::new(
            stores.ledger.clone(),
            directory,
            aggregates.clone(),
            attribution.clone(),
            config.ingestion.clone(),
            config.retry.clone(),
        );

        Self {
            stores,
            ingestion,
            aggregates,
            attribution,
            ranker,
            milestones: MilestoneEvaluator::default(),
            clock: Arc::new(SystemClock),
            ingestion_config: config.ingestion.clone(),
        }
    }

    /// Create an engine from configuration alone: the static directory and
    /// the configured milestone table.
    pub fn from_config(config: &Config, stores: Stores) -> std::result::Result<Self, ConfigError> {
        let directory = Arc::new(StaticDirectory::from_config(&config.directory));
        let milestones = MilestoneEvaluator::from_config(&config.milestones)?;
        Ok(Self::new(config, stores, directory.clone(), directory).with_milestones(milestones))
    }

    /// Replace the milestone table.
    pub fn with_milestones(mut self, milestones: MilestoneEvaluator) -> Self {
        self.milestones = milestones;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// A scheduler driving this engine's leaderboard recomputes.
    pub fn scheduler(&self, period: std::time::Duration) -> LeaderboardScheduler {
        LeaderboardScheduler::new(self.ranker.clone(), self.clock.clone(), period)
    }

    // --- donations ---

    pub async fn record_donation(&self, request: &DonationRequest) -> Result<Donation> {
        self.ingestion.record(request, self.clock.now()).await
    }

    /// Mark a completed donation as failed and revert its aggregates.
    pub async fn mark_failed(&self, donation_id: &str) -> Result<Donation> {
        self.ingestion.mark_failed(donation_id, self.clock.now()).await
    }

    pub async fn get_donation(&self, donation_id: &str) -> Result<Donation> {
        self.stores
            .ledger
            .get(donation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("donation", donation_id))
    }

    /// Totals over completed donations, optionally for one region and/or
    /// one child. The guest sentinel is not counted as a donor.
    pub async fn get_totals(
        &self,
        region_id: Option<&str>,
        child_id: Option<&str>,
    ) -> Result<Totals> {
        let mut filter = self.completed();
        if let Some(region_id) = region_id {
            filter = filter.region(region_id);
        }
        if let Some(child_id) = child_id {
            filter = filter.child(child_id);
        }
        Ok(self.stores.ledger.totals(&filter).await?)
    }

    pub async fn donations_by_donor(&self, donor_id: &str, limit: u64) -> Result<Vec<Donation>> {
        let filter = DonationFilter::default().donor(donor_id).limit(limit);
        Ok(self.stores.ledger.list(&filter).await?)
    }

    pub async fn donations_by_child(&self, child_id: &str, limit: u64) -> Result<Vec<Donation>> {
        let filter = DonationFilter::default().child(child_id).limit(limit);
        Ok(self.stores.ledger.list(&filter).await?)
    }

    pub async fn donations_by_region(&self, region_id: &str, limit: u64) -> Result<Vec<Donation>> {
        let filter = DonationFilter::default().region(region_id).limit(limit);
        Ok(self.stores.ledger.list(&filter).await?)
    }

    /// Latest completed donations across the ledger.
    pub async fn recent_donations(&self, limit: u64) -> Result<Vec<Donation>> {
        Ok(self.stores.ledger.list(&self.completed().limit(limit)).await?)
    }

    /// Donors ranked by completed giving, all time.
    pub async fn top_donors(&self, limit: u64) -> Result<Vec<GroupTotal>> {
        let filter = self.completed().limit(limit);
        Ok(self.stores.ledger.group_totals(GroupBy::Donor, &filter).await?)
    }

    /// Donors ranked by completed giving to one child.
    pub async fn top_donors_for_child(
        &self,
        child_id: &str,
        limit: u64,
    ) -> Result<Vec<GroupTotal>> {
        let filter = self.completed().child(child_id).limit(limit);
        Ok(self.stores.ledger.group_totals(GroupBy::Donor, &filter).await?)
    }

    // --- aggregates ---

    pub async fn child_total(&self, child_id: &str) -> Result<RunningTotal> {
        self.stores
            .aggregates
            .child_total(child_id)
            .await?
            .ok_or_else(|| EngineError::not_found("child total", child_id))
    }

    pub async fn region_total(&self, region_id: &str) -> Result<RunningTotal> {
        self.stores
            .aggregates
            .region_total(region_id)
            .await?
            .ok_or_else(|| EngineError::not_found("region total", region_id))
    }

    /// The region's summary for the bucket containing now. A bucket with no
    /// donations yet reads as zero.
    pub async fn get_region_period_summary(
        &self,
        region_id: &str,
        period: PeriodKind,
    ) -> Result<DonationSummary> {
        let now = self.clock.now();
        let bucket_date = period.bucket_for(now);
        let summary = self
            .stores
            .aggregates
            .summary(region_id, period, bucket_date)
            .await?;

        Ok(summary.unwrap_or_else(|| DonationSummary {
            region_id: region_id.to_string(),
            period,
            bucket_date,
            total_amount: Amount::ZERO,
            donation_count: 0,
            unique_donors: 0,
            updated_at: now,
        }))
    }

    /// Every region's summary for the bucket containing now, highest total
    /// first.
    pub async fn list_region_summaries(&self, period: PeriodKind) -> Result<Vec<DonationSummary>> {
        let bucket_date = period.bucket_for(self.clock.now());
        Ok(self
            .stores
            .aggregates
            .summaries(period, Some(bucket_date))
            .await?)
    }

    pub async fn resync_child(&self, child_id: &str) -> Result<RunningTotal> {
        Ok(self.aggregates.resync_child(child_id, self.clock.now()).await?)
    }

    pub async fn resync_region(&self, region_id: &str) -> Result<RunningTotal> {
        Ok(self
            .aggregates
            .resync_region(region_id, self.clock.now())
            .await?)
    }

    pub async fn rebuild_region_summaries(&self, region_id: &str) -> Result<Vec<DonationSummary>> {
        Ok(self
            .aggregates
            .rebuild_region_summaries(region_id, self.clock.now())
            .await?)
    }

    // --- referrals ---

    pub async fn track_click(&self, code: &str, source: Option<&str>) -> Result<ReferralTracking> {
        Ok(self
            .attribution
            .track_click(code, source, self.clock.now())
            .await?)
    }

    pub async fn register_referral(&self, code: &str, user_id: &str) -> Result<ReferralTracking> {
        Ok(self
            .attribution
            .register(code, user_id, self.clock.now())
            .await?)
    }

    pub async fn expire_referral(&self, tracking_id: &str) -> Result<ReferralTracking> {
        Ok(self.attribution.expire(tracking_id, self.clock.now()).await?)
    }

    pub async fn get_referral_stats(&self, user_id: &str) -> Result<ReferralStats> {
        Ok(self.attribution.stats(user_id).await?)
    }

    pub async fn referral_leaderboard(
        &self,
        period: PeriodKind,
        limit: u64,
    ) -> Result<Vec<ReferrerLeaderboardEntry>> {
        Ok(self
            .attribution
            .leaderboard(period, limit, self.clock.now())
            .await?)
    }

    // --- leaderboards ---

    pub async fn get_leaderboard(
        &self,
        kind: LeaderboardKind,
        period: PeriodKind,
        limit: u64,
        offset: u64,
    ) -> Result<Leaderboard> {
        self.ranker
            .page(kind, period, limit, offset, self.clock.now())
            .await
    }

    pub async fn get_ranking(
        &self,
        kind: LeaderboardKind,
        entity_id: &str,
        period: PeriodKind,
    ) -> Result<Option<LeaderboardEntry>> {
        self.ranker
            .ranking(kind, entity_id, period, self.clock.now())
            .await
    }

    /// Recompute every leaderboard for the buckets containing now.
    pub async fn recompute_leaderboards(&self) -> RecomputeSummary {
        self.ranker.recompute_all(self.clock.now()).await
    }

    // --- milestones ---

    pub fn get_milestone_progress(
        &self,
        total: Amount,
        applicability: Applicability,
    ) -> MilestoneProgress {
        self.milestones.progress(total, applicability)
    }

    pub fn milestone_by_id(&self, milestone_id: &str) -> Result<Milestone> {
        self.milestones
            .by_id(milestone_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("milestone", milestone_id))
    }

    /// Progress of a donor's completed giving.
    pub async fn donor_milestone_progress(&self, donor_id: &str) -> Result<MilestoneProgress> {
        let totals = self
            .stores
            .ledger
            .totals(&DonationFilter::completed().donor(donor_id))
            .await?;
        Ok(self
            .milestones
            .progress(totals.total_amount, Applicability::User))
    }

    /// Progress of everything completed in a region.
    pub async fn region_milestone_progress(&self, region_id: &str) -> Result<MilestoneProgress> {
        let totals = self
            .stores
            .ledger
            .totals(&DonationFilter::completed().region(region_id))
            .await?;
        Ok(self
            .milestones
            .progress(totals.total_amount, Applicability::Region))
    }

    fn completed(&self) -> DonationFilter {
        DonationFilter::completed().ignoring_donor(self.ingestion_config.guest_donor_id.as_deref())
    }
}
