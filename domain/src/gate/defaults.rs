//! The default gate set used when no gate configuration is supplied.
//!
//! | id | type | command | timeout | required |
//! |----|------|---------|---------|----------|
//! | lint | lint | `npm run lint` | 120s | yes |
//! | types | types | `npm run typecheck` | 180s | yes |
//! | tests | tests | `npm test` | 600s | yes |
//! | build | build | `npm run build` | 600s | yes |
//! | integration | integration | `npm run test:integration` | 900s | no (warn) |
//! | deploy | deploy | `npm run deploy -- --dry-run` | 300s | no (warn) |

use super::entities::{FailurePolicy, GateType, QualityGate};

pub fn default_gates() -> Vec<QualityGate> {
    vec![
        QualityGate::new("lint", "Lint", GateType::Lint, "npm run lint").with_timeout_secs(120),
        QualityGate::new("types", "Type Check", GateType::Types, "npm run typecheck")
            .with_timeout_secs(180),
        QualityGate::new("tests", "Unit Tests", GateType::Tests, "npm test").with_timeout_secs(600),
        QualityGate::new("build", "Build", GateType::Build, "npm run build").with_timeout_secs(600),
        QualityGate::new(
            "integration",
            "Integration Tests",
            GateType::Integration,
            "npm run test:integration",
        )
        .with_timeout_secs(900)
        .optional(FailurePolicy::Warn),
        QualityGate::new(
            "deploy",
            "Deploy Check",
            GateType::Deploy,
            "npm run deploy -- --dry-run",
        )
        .with_timeout_secs(300)
        .optional(FailurePolicy::Warn),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::sort_by_priority;

    #[test]
    fn test_default_set_shape() {
        let gates = default_gates();
        assert_eq!(gates.len(), 6);
        assert_eq!(gates.iter().filter(|g| g.required).count(), 4);
        assert_eq!(sort_by_priority(&gates), gates);
    }
}
