//! Donation Engine - donation ledger for a child-sponsorship charity
//!
//! Records donations immutably, keeps child and region running totals and
//! per-period summaries in step, attributes donations to referral codes,
//! evaluates milestones and ranks donors, regions and schools.
//!
//! Start with [`DonationEngine`]; storage backends live in [`storage`].

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;

pub use engine::DonationEngine;
pub use error::{EngineError, Result};
