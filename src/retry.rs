//! Retry policy: continue-vs-stop for the attempt loop.

use crate::diagnose::FailureCategory;
use serde::Serialize;

/// Rationale used whenever the attempt budget is the stopping reason.
pub const MAX_ATTEMPTS_RATIONALE: &str = "maximum attempts reached";

#[derive(Debug, Clone, Serialize)]
pub struct RetryDecision {
    pub proceed: bool,
    pub rationale: String,
}

/// Decide whether another attempt is worth making.
///
/// The budget check is the only stopping rule: every category in the
/// taxonomy is considered correctable through regeneration, so no category
/// declines early. That is a deliberate policy choice, not a missing
/// branch; the orchestrator still honors a declining decision if one is
/// ever added.
pub fn decide(category: FailureCategory, attempt: u32, max_attempts: u32) -> RetryDecision {
    if attempt >= max_attempts {
        return RetryDecision {
            proceed: false,
            rationale: MAX_ATTEMPTS_RATIONALE.to_string(),
        };
    }

    let rationale = match category {
        FailureCategory::Infeasible => "attempt relaxation of conflicting constraints".to_string(),
        FailureCategory::Unbounded => "attempt to add missing variable bounds".to_string(),
        other => format!("{} is correctable through regeneration", other.label()),
    };

    RetryDecision {
        proceed: true,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CATEGORIES: [FailureCategory; 7] = [
        FailureCategory::SetParameterMismatch,
        FailureCategory::DuplicateDefinition,
        FailureCategory::SyntaxError,
        FailureCategory::Infeasible,
        FailureCategory::Unbounded,
        FailureCategory::Timeout,
        FailureCategory::General,
    ];

    #[test]
    fn budget_exhaustion_stops_every_category() {
        for category in ALL_CATEGORIES {
            let decision = decide(category, 3, 3);
            assert!(!decision.proceed);
            assert_eq!(decision.rationale, MAX_ATTEMPTS_RATIONALE);
        }
    }

    #[test]
    fn over_budget_also_stops() {
        let decision = decide(FailureCategory::General, 5, 3);
        assert!(!decision.proceed);
    }

    #[test]
    fn every_category_continues_within_budget() {
        for category in ALL_CATEGORIES {
            let decision = decide(category, 1, 3);
            assert!(decision.proceed, "{} should continue", category);
            assert!(!decision.rationale.is_empty());
        }
    }

    #[test]
    fn infeasible_rationale_mentions_relaxation() {
        let decision = decide(FailureCategory::Infeasible, 1, 3);
        assert!(decision.rationale.contains("relaxation"));
    }

    #[test]
    fn unbounded_rationale_mentions_bounds() {
        let decision = decide(FailureCategory::Unbounded, 1, 3);
        assert!(decision.rationale.contains("bounds"));
    }
}
