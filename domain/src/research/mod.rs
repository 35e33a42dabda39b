//! Research pipeline domain
//!
//! A research run moves through three phases:
//!
//! ```text
//! ResearchQuery ─▶ Discovery (parallel) ─▶ Analysis (sequential) ─▶ Synthesis
//!                  DiscoveryResult         AnalysisResult           SynthesisReport
//! ```
//!
//! Discovery and analysis results are append-only and consumed once by
//! [`synthesize`]. Synthesis references insights by id and never mutates them.

pub mod analysis;
pub mod discovery;
pub mod query;
pub mod report;
pub mod source;
pub mod synthesis;

pub use analysis::{
    AnalysisPayload, AnalysisResult, Evidence, ImpactLevel, Insight, Relationship,
    RelationshipKind,
};
pub use discovery::{
    DiscoveryPayload, DiscoveryResult, DocReference, FileReference, PatternMatch, merge_discovery,
    relevance_score,
};
pub use query::{DateRange, ResearchConstraints, ResearchDepth, ResearchQuery, ResearchScope};
pub use report::ResearchReport;
pub use source::{Contribution, SourceStats};
pub use synthesis::{
    CategorySection, Horizon, Recommendation, Risk, SynthesisReport, synthesize,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchPhase {
    Discovery,
    Analysis,
    Synthesis,
}

impl ResearchPhase {
    pub fn as_str(&self) -> &str {
        match self {
            ResearchPhase::Discovery => "discovery",
            ResearchPhase::Analysis => "analysis",
            ResearchPhase::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
