//! Fantasy Asset Price Change Predictor
//!
//! Heuristic engine that estimates which assets are about to rise or fall in
//! price from the transfer activity in a bulk snapshot.
//!
//! ## Architecture
//!
//! ```text
//! Snapshot → Validate → Candidates ─┬→ Threshold ──┐
//!                                   ├→ Wildcard ───┤
//!            History ──→ Context ───┼→ Flags ──────┼→ Progress → Confidence → Summary
//!                                   └→ Forecast ───┘
//! ```

pub mod confidence;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod flags;
pub mod forecast;
pub mod threshold;
pub mod types;
pub mod utils;
pub mod wildcard;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod error_tests;
