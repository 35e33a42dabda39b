use super::confidence::ConfidenceLevel;
use serde::{Deserialize, Serialize};

/// A single claim made by an agent about some entity (a file, a symbol, a topic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub entity: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    pub confidence: ConfidenceLevel,
}

impl Finding {
    pub fn new(
        entity: impl Into<String>,
        content: impl Into<String>,
        confidence: ConfidenceLevel,
    ) -> Self {
        Self {
            entity: entity.into(),
            content: content.into(),
            category: None,
            confidence,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn key(&self) -> FindingKey {
        FindingKey {
            entity: normalize_entity(&self.entity),
            signature: self.content.trim().to_string(),
        }
    }
}

/// Dedup key: normalised entity identity plus exact (trimmed) content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FindingKey {
    pub entity: String,
    pub signature: String,
}

/// Lowercased, trimmed, forward slashes, no leading `./`.
pub fn normalize_entity(entity: &str) -> String {
    let unified = entity.trim().replace('\\', "/").to_lowercase();
    unified
        .strip_prefix("./")
        .map(str::to_string)
        .unwrap_or(unified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalises_entity_but_not_content_case() {
        let a = Finding::new("./src/Lib.rs", "uses unsafe ", ConfidenceLevel::Low);
        let b = Finding::new("src\\lib.rs", "uses unsafe", ConfidenceLevel::High);
        let c = Finding::new("src/lib.rs", "Uses unsafe", ConfidenceLevel::High);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }
}
