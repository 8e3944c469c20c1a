//! Milestone reference data.
//!
//! Milestones are static thresholds. Whether one is achieved, current or
//! next is always derived from a cumulative total and never stored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Amount, ParseEnumError};

/// Who a milestone applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    User,
    Region,
    /// Badges earned by a single referral relationship.
    Referral,
}

impl Applicability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Applicability::User => "user",
            Applicability::Region => "region",
            Applicability::Referral => "referral",
        }
    }
}

impl fmt::Display for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Applicability {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Applicability::User),
            "region" => Ok(Applicability::Region),
            "referral" => Ok(Applicability::Referral),
            other => Err(ParseEnumError::new("milestone applicability", other)),
        }
    }
}

fn default_active() -> bool {
    true
}

/// One threshold in the milestone table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    pub threshold: Amount,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub badge_icon: Option<String>,
    #[serde(default)]
    pub badge_color: Option<String>,
    #[serde(default)]
    pub order_rank: i32,
    pub applicability: Applicability,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Milestone {
    fn builtin(
        id: &str,
        name: &str,
        major_units: i64,
        description: &str,
        badge_color: &str,
        order_rank: i32,
        applicability: Applicability,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            threshold: Amount::from_major_units(major_units),
            description: Some(description.to_string()),
            badge_icon: None,
            badge_color: Some(badge_color.to_string()),
            order_rank,
            applicability,
            active: true,
        }
    }

    /// Table used when no milestone file is configured.
    pub fn defaults() -> Vec<Milestone> {
        let mut table: Vec<Milestone> = USER_MILESTONES
            .iter()
            .zip(1..)
            .map(|(&(id, name, major, description, color), rank)| {
                Self::builtin(id, name, major, description, color, rank, Applicability::User)
            })
            .collect();
        table.push(Self::builtin(
            "central-region",
            "Central Region Milestone",
            100_000,
            "Milestone for Central region donations",
            "#regioncolor",
            1,
            Applicability::Region,
        ));
        table
    }

    /// Badges a referrer earns as one referred donor's cumulative amount grows.
    /// The badge name doubles as the reward description.
    pub fn referral_badges() -> Vec<Milestone> {
        REFERRAL_BADGES
            .iter()
            .zip(1..)
            .map(|(&(id, name, major), rank)| Self {
                id: id.to_string(),
                name: name.to_string(),
                threshold: Amount::from_major_units(major),
                description: None,
                badge_icon: None,
                badge_color: None,
                order_rank: rank,
                applicability: Applicability::Referral,
                active: true,
            })
            .collect()
    }
}

const USER_MILESTONES: [(&str, &str, i64, &str, &str); 8] = [
    ("first-step", "First Step", 100, "Your first donation makes a difference!", "#bronze"),
    ("supporter", "Supporter", 500, "Thank you for your continued support", "#silver"),
    ("contributor", "Contributor", 1_000, "Your generosity helps children thrive", "#gold"),
    ("benefactor", "Benefactor", 2_500, "Making a significant impact on education", "#platinum"),
    ("champion", "Champion", 5_000, "A true champion for children's education", "#diamond"),
    ("hero", "Hero", 10_000, "Heroes change lives and futures", "#rainbow"),
    ("legend", "Legend", 25_000, "Legendary support for the next generation", "#legendary"),
    ("visionary", "Visionary", 50_000, "Visionary donors transform communities", "#visionary"),
];

const REFERRAL_BADGES: [(&str, &str, i64); 4] = [
    ("bronze-referrer", "Bronze Referrer", 1_000),
    ("silver-referrer", "Silver Referrer", 5_000),
    ("gold-referrer", "Gold Referrer", 10_000),
    ("platinum-referrer", "Platinum Referrer", 25_000),
];

/// The lowest unmet milestone and how far away it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextMilestone {
    pub milestone: Milestone,
    pub amount_needed: Amount,
    pub progress_percentage: f64,
}

/// Full milestone picture for one cumulative total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneProgress {
    pub total_amount: Amount,
    /// Achieved milestones, highest threshold first.
    pub achieved: Vec<Milestone>,
    pub current: Option<Milestone>,
    pub next: Option<NextMilestone>,
    pub total_milestones: usize,
    pub achieved_count: usize,
    pub completion_percentage: f64,
}
