//! The extraction pipeline: recovery, rate limiting, retry, provider
//! adapters, validation/salvage, per-item extraction, and batch
//! orchestration.
//!
//! Data flow: [`batch::BatchOrchestrator`] → [`extract::ExtractionClient`]
//! → [`recovery`] → [`validate`]/[`salvage`] → comparison → review.

pub mod batch;
pub mod diagnostic;
pub mod extract;
pub mod prompts;
pub mod providers;
pub mod rate_limit;
pub mod recovery;
pub mod retry;
pub mod salvage;
pub mod validate;
