//! Result aggregation
//!
//! Combines the outputs of several agents into one confidence-scored result.
//!
//! | Strategy | Finding score | Ordering |
//! |----------|---------------|----------|
//! | merge | best contributing confidence | first seen |
//! | vote | mean confidence | most corroborated first |
//! | weighted | weight-scaled mean per agent type | highest score first |
//! | priority | confidence of the highest-priority contributor | first seen |
//!
//! Confidence categories only become numbers inside this module; results
//! carry the re-quantised [`ConfidenceLevel`] plus an explicit
//! `confidence_score` field.

pub mod aggregate;
pub mod confidence;
pub mod finding;
pub mod strategy;

pub use aggregate::{AggregatedFinding, AggregatedResult, ConflictRecord, DiscardedFinding, aggregate};
pub use confidence::ConfidenceLevel;
pub use finding::{Finding, FindingKey};
pub use strategy::{AggregationKind, AggregationStrategy, ConflictRule};
