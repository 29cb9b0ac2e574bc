//! Showcase-Core: scoring, ranking and round results for talent showcases
//!
//! Turns a round's performances, judge scores and audience votes into
//! ranked, versioned standings, and hosts the services that feed them.
//!
//! ## Key Components
//!
//! - `ResultsEngine`: concurrent per-performance reads, deterministic ranking,
//!   append-only versioned results, cooperative cancellation
//! - `ScoringPolicy`: how judge and audience scores combine
//!   (`AdditiveScoring` by default)
//! - `VotingService`: one vote per voter per performance
//! - `PerformanceService` / `ScoringService`: submission, review, judging
//! - `RoundService` / `ContestantService`: round setup, slots, profiles

pub mod cancel;
pub mod config;
pub mod contestants;
pub mod engine;
pub mod error;
pub mod obs;
pub mod ranking;
pub mod rounds;
pub mod scoring;
pub mod submissions;
pub mod telemetry;
pub mod voting;

pub use cancel::{CancelHandle, CancelToken};
pub use config::EngineConfig;
pub use contestants::ContestantService;
pub use engine::ResultsEngine;
pub use error::{Result, ShowcaseError};
pub use ranking::{rank_tallies, PerformanceTally};
pub use rounds::RoundService;
pub use scoring::{AdditiveScoring, ScoringPolicy};
pub use submissions::{PerformanceDraft, PerformanceService, ReviewDecision, ScoringService};
pub use telemetry::init_tracing;
pub use voting::VotingService;

// Re-export the storage layer so callers need a single dependency.
pub use showcase_state;
