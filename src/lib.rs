//! Nutrilens — turns scanned supplement and nutrition labels into
//! structured, quality-scored records by cross-checking vision-capable
//! language models.
//!
//! The interesting engineering is tolerance: model output is
//! non-deterministic and frequently malformed, so recovery is a
//! multi-strategy cascade, validation salvages per field instead of
//! failing whole records, and two independent models are diffed to find
//! what neither can be trusted on alone.

pub mod compare;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod review;
pub mod store;
