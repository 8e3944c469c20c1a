//! Shared utilities: process bootstrap, conflict retry policy and clocks.

pub mod bootstrap;
pub mod clock;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock};
