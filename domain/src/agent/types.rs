use serde::{Deserialize, Serialize};

/// The closed set of agent kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    /// Finds source files relevant to a query
    CodeLocator,
    /// Finds documentation relevant to a query
    DocumentationLocator,
    /// Finds recurring code patterns matching a query
    PatternFinder,
    /// Derives insights about code structure from discovery output
    CodebaseAnalyzer,
    /// Derives insights from documentation and prior analysis
    ResearchAnalyzer,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::CodeLocator,
        AgentType::DocumentationLocator,
        AgentType::PatternFinder,
        AgentType::CodebaseAnalyzer,
        AgentType::ResearchAnalyzer,
    ];

    /// Agents run concurrently in the discovery phase.
    pub const DISCOVERY: [AgentType; 3] = [
        AgentType::CodeLocator,
        AgentType::DocumentationLocator,
        AgentType::PatternFinder,
    ];

    /// Agents run one at a time in the analysis phase, in this order.
    pub const ANALYSIS: [AgentType; 2] = [AgentType::CodebaseAnalyzer, AgentType::ResearchAnalyzer];

    pub fn as_str(&self) -> &str {
        match self {
            AgentType::CodeLocator => "code-locator",
            AgentType::DocumentationLocator => "documentation-locator",
            AgentType::PatternFinder => "pattern-finder",
            AgentType::CodebaseAnalyzer => "codebase-analyzer",
            AgentType::ResearchAnalyzer => "research-analyzer",
        }
    }

    pub fn is_discovery(&self) -> bool {
        Self::DISCOVERY.contains(self)
    }

    pub fn is_analysis(&self) -> bool {
        Self::ANALYSIS.contains(self)
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        AgentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = AgentType::ALL.iter().map(|t| t.as_str()).collect();
                format!("Unknown agent type: {}. Valid: {}", s, valid.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_underscores() {
        assert_eq!(
            "code_locator".parse::<AgentType>().ok(),
            Some(AgentType::CodeLocator)
        );
        assert_eq!(
            "Research-Analyzer".parse::<AgentType>().ok(),
            Some(AgentType::ResearchAnalyzer)
        );
        assert!("web-search".parse::<AgentType>().is_err());
    }

    #[test]
    fn test_phase_membership() {
        assert!(AgentType::PatternFinder.is_discovery());
        assert!(!AgentType::PatternFinder.is_analysis());
        assert!(AgentType::CodebaseAnalyzer.is_analysis());
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&AgentType::DocumentationLocator).unwrap();
        assert_eq!(json, "\"documentation-locator\"");
    }
}
