//! Milestone Evaluator.
//!
//! Pure lookups over a threshold table partitioned by applicability. Only
//! active milestones take part in any evaluation.

use std::path::Path;

use tracing::info;

use crate::config::{ConfigError, MilestoneConfig};
use crate::model::{Amount, Applicability, Milestone, MilestoneProgress, NextMilestone};

/// Evaluates cumulative totals against a milestone table.
#[derive(Debug, Clone)]
pub struct MilestoneEvaluator {
    /// Sorted by threshold, then order rank.
    milestones: Vec<Milestone>,
}

impl Default for MilestoneEvaluator {
    fn default() -> Self {
        Self::new(Milestone::defaults())
    }
}

impl MilestoneEvaluator {
    pub fn new(mut milestones: Vec<Milestone>) -> Self {
        milestones.sort_by(|a, b| {
            a.threshold
                .cmp(&b.threshold)
                .then(a.order_rank.cmp(&b.order_rank))
        });
        Self { milestones }
    }

    /// Load the table from a YAML list of milestones.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let table: Vec<Milestone> =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Milestones {
                path: shown.clone(),
                source,
            })?;

        info!(path = %shown, milestones = table.len(), "Loaded milestone table");
        Ok(Self::new(table))
    }

    /// The configured table, or the built-in one when no path is set.
    pub fn from_config(config: &MilestoneConfig) -> Result<Self, ConfigError> {
        match &config.path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Every milestone in the table, active or not.
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn by_id(&self, id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }

    /// Active milestones for `applicability`, lowest threshold first.
    pub fn active(&self, applicability: Applicability) -> impl Iterator<Item = &Milestone> + '_ {
        self.milestones
            .iter()
            .filter(move |m| m.active && m.applicability == applicability)
    }

    /// Milestones at or below `total`, highest first.
    pub fn achieved(&self, total: Amount, applicability: Applicability) -> Vec<Milestone> {
        let mut achieved: Vec<Milestone> = self
            .active(applicability)
            .filter(|m| m.threshold <= total)
            .cloned()
            .collect();
        achieved.reverse();
        achieved
    }

    /// Highest milestone at or below `total`.
    pub fn current(&self, total: Amount, applicability: Applicability) -> Option<Milestone> {
        self.active(applicability)
            .filter(|m| m.threshold <= total)
            .last()
            .cloned()
    }

    /// Lowest milestone above `total`.
    pub fn next(&self, total: Amount, applicability: Applicability) -> Option<NextMilestone> {
        let milestone = self.active(applicability).find(|m| m.threshold > total)?;
        Some(NextMilestone {
            milestone: milestone.clone(),
            amount_needed: milestone.threshold.checked_sub(total).unwrap_or(Amount::ZERO),
            progress_percentage: total.percent_of(milestone.threshold),
        })
    }

    pub fn progress(&self, total: Amount, applicability: Applicability) -> MilestoneProgress {
        let achieved = self.achieved(total, applicability);
        let total_milestones = self.active(applicability).count();
        let achieved_count = achieved.len();
        let completion_percentage = if total_milestones == 0 {
            0.0
        } else {
            achieved_count as f64 / total_milestones as f64 * 100.0
        };

        MilestoneProgress {
            total_amount: total,
            current: achieved.first().cloned(),
            next: self.next(total, applicability),
            achieved,
            total_milestones,
            achieved_count,
            completion_percentage,
        }
    }
}
