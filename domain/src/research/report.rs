use super::analysis::AnalysisResult;
use super::discovery::DiscoveryResult;
use super::query::ResearchQuery;
use super::synthesis::SynthesisReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a research run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub query: ResearchQuery,
    pub discovery: DiscoveryResult,
    pub analysis: AnalysisResult,
    pub synthesis: SynthesisReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}
