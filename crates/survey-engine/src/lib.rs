//! Response scoring and question-snapshot engine for the survey platform.
//!
//! The crate freezes an immutable copy of every question a respondent saw,
//! grades answers against those snapshots, and aggregates survey-wide
//! statistics from the stored snapshots alone, so later edits to question
//! banks never change a recorded score.

pub mod config;
pub mod error;
pub mod surveys;
pub mod telemetry;
