//! Research queries and their constraints

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which part of the workspace a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResearchScope {
    Codebase,
    Documentation,
    #[default]
    All,
}

impl ResearchScope {
    pub fn includes_code(&self) -> bool {
        matches!(self, ResearchScope::Codebase | ResearchScope::All)
    }

    pub fn includes_docs(&self) -> bool {
        matches!(self, ResearchScope::Documentation | ResearchScope::All)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResearchScope::Codebase => "codebase",
            ResearchScope::Documentation => "documentation",
            ResearchScope::All => "all",
        }
    }
}

impl std::fmt::Display for ResearchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "codebase" | "code" => Ok(ResearchScope::Codebase),
            "documentation" | "docs" => Ok(ResearchScope::Documentation),
            "all" => Ok(ResearchScope::All),
            _ => Err(format!(
                "Unknown scope: {}. Valid: codebase, documentation, all",
                s
            )),
        }
    }
}

/// How thorough a research run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Shallow,
    #[default]
    Medium,
    Deep,
}

impl ResearchDepth {
    /// File cap applied when the query sets no explicit `max_files`.
    pub fn default_max_files(&self) -> usize {
        match self {
            ResearchDepth::Shallow => 10,
            ResearchDepth::Medium => 25,
            ResearchDepth::Deep => 50,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResearchDepth::Shallow => "shallow",
            ResearchDepth::Medium => "medium",
            ResearchDepth::Deep => "deep",
        }
    }
}

impl std::fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shallow" | "quick" => Ok(ResearchDepth::Shallow),
            "medium" | "normal" => Ok(ResearchDepth::Medium),
            "deep" | "thorough" => Ok(ResearchDepth::Deep),
            _ => Err(format!("Unknown depth: {}. Valid: shallow, medium, deep", s)),
        }
    }
}

/// Inclusive date window on file modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateRange {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.since.is_none_or(|s| day >= s) && self.until.is_none_or(|u| day <= u)
    }

    pub fn is_valid(&self) -> bool {
        match (self.since, self.until) {
            (Some(s), Some(u)) => s <= u,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResearchConstraints {
    #[serde(default)]
    pub max_files: Option<usize>,
    /// Extensions without the leading dot; empty means any
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

impl ResearchConstraints {
    pub fn allows_path(&self, path: &str) -> bool {
        if self.file_types.is_empty() {
            return true;
        }
        let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.file_types
            .iter()
            .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Files with unknown modification time are excluded once a date range is set.
    pub fn allows_modified(&self, modified: Option<DateTime<Utc>>) -> bool {
        match (self.date_range, modified) {
            (None, _) => true,
            (Some(range), Some(at)) => range.contains(at),
            (Some(_), None) => false,
        }
    }

    pub fn max_files_for(&self, depth: ResearchDepth) -> usize {
        self.max_files.unwrap_or_else(|| depth.default_max_files())
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "how", "what", "where", "why", "which", "who", "does", "this", "that",
    "with", "from", "into", "are", "was", "were", "is", "our", "its", "use", "used", "all",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub text: String,
    #[serde(default)]
    pub scope: ResearchScope,
    #[serde(default)]
    pub depth: ResearchDepth,
    #[serde(default)]
    pub constraints: ResearchConstraints,
}

impl ResearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scope: ResearchScope::default(),
            depth: ResearchDepth::default(),
            constraints: ResearchConstraints::default(),
        }
    }

    pub fn with_scope(mut self, scope: ResearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_constraints(mut self, constraints: ResearchConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn max_files(&self) -> usize {
        self.constraints.max_files_for(self.depth)
    }

    /// Lowercased search terms: at least three characters, stopwords removed,
    /// first occurrence order.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for word in self
            .text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .map(str::to_lowercase)
        {
            if word.chars().count() >= 3
                && !STOPWORDS.contains(&word.as_str())
                && !terms.contains(&word)
            {
                terms.push(word);
            }
        }
        terms
    }
}
