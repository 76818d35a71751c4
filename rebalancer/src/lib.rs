//! freqkeeper-rebalancer: account maintenance for a fleet of freqtrade bots.
//!
//! Liquidates exchange accounts into a reference currency, runs the
//! stop / reset / reboot / reinstall / restart cycle on each bot machine,
//! and records everything in a JSONL audit trail.

pub mod alert;
pub mod audit;
pub mod botapi;
pub mod broker;
pub mod config;
pub mod cycle;
pub mod error;
pub mod execution;
pub mod liquidate;
pub mod report;
pub mod retry;
pub mod shell;

pub use liquidate::{Liquidation, liquidate_all};
pub use retry::{PollPolicy, poll};
