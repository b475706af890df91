//! Failure classification for generated optimization code.
//!
//! The taxonomy lives in one static priority-ordered table; classification
//! is first-match-wins over the trigger substrings because the phrases are
//! not mutually exclusive ("already defined" outranks "syntax error" when a
//! duplicate definition drags a syntax complaint along with it). Keeping
//! descriptions, remediation text, and reprompt guidance in the table keeps
//! the taxonomy independently testable from the orchestration loop.

use crate::util::truncate;
use serde::Serialize;
use std::fmt;

const DETAIL_MAX_CHARS: usize = 1_200;

/// Fixed failure taxonomy, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureCategory {
    SetParameterMismatch,
    DuplicateDefinition,
    SyntaxError,
    Infeasible,
    Unbounded,
    Timeout,
    General,
}

impl FailureCategory {
    pub fn label(&self) -> &'static str {
        match self {
            FailureCategory::SetParameterMismatch => "set/parameter mismatch",
            FailureCategory::DuplicateDefinition => "duplicate definition",
            FailureCategory::SyntaxError => "modeling syntax error",
            FailureCategory::Infeasible => "infeasible model",
            FailureCategory::Unbounded => "unbounded model",
            FailureCategory::Timeout => "timeout",
            FailureCategory::General => "general failure",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the taxonomy table.
pub(crate) struct CategoryRule {
    pub category: FailureCategory,
    pub triggers: &'static [&'static str],
    pub description: &'static str,
    pub root_cause: &'static str,
    pub remediation: &'static str,
    pub prevention: &'static str,
    /// Category-specific corrective block for the reprompt; `None` falls
    /// back to [`GENERAL_GUIDANCE`].
    pub reprompt_guidance: Option<&'static str>,
}

pub(crate) const GENERAL_GUIDANCE: &str = "\
GENERAL CORRECTION STEPS:
1. Check the import statements (amplpy, modules).
2. Validate set/parameter consistency before assigning data.
3. Use only ASCII characters in printed output.
4. Keep the model definition separate from data assignment.
5. Re-derive the model step by step from the task statement.";

const SET_PARAMETER_GUIDANCE: &str = "\
SET/PARAMETER CORRECTION:
1. Every ampl.param[name] index MUST be a member of the corresponding set.
2. Example: if ampl.param['price'] = {'H': 50}, then 'H' must be in set PRODUCTS.
3. For 2D parameters, both tuple elements must exist in their sets.
4. ORDER: always define sets first, then parameters.
5. Use string indices for set elements: {'R1': value}, never {1: value}.
6. Print all sets before assigning parameters to verify membership.";

const DUPLICATE_DEFINITION_GUIDANCE: &str = "\
DUPLICATE DEFINITION CORRECTION:
1. NEVER pass data through ampl.eval() - it is for the model only.
2. Assign all data with ampl.set[...] and ampl.param[...].
3. Define the model as one string and call ampl.eval(model_str) exactly once.
4. Remove every data statement from model_str.
Template:
    model_str = \"set ITEMS; param cost {ITEMS}; var x {ITEMS} integer >= 0;\"
    ampl.eval(model_str)
    ampl.set['ITEMS'] = ['item1', 'item2']
    ampl.param['cost'] = {'item1': 5, 'item2': 8}";

const INFEASIBLE_GUIDANCE: &str = "\
INFEASIBILITY CORRECTION:
1. Check that total supply covers total demand.
2. Relax overly strict constraints (<= instead of = where the task allows it).
3. Add slack variables to locate the conflicting constraints.
4. Compare capacity limits against requirements before solving.";

/// Priority-ordered classification rules. The final row is the General
/// fallback and must keep an empty trigger list.
pub(crate) const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: FailureCategory::SetParameterMismatch,
        triggers: &["invalid subscript", "not defined"],
        description: "A parameter index does not exist in the referenced set",
        root_cause: "AMPL requires every parameter index to be a member of the corresponding set",
        remediation: "Define sets before parameters and keep index strings consistent",
        prevention: "Use template-based set/parameter definitions",
        reprompt_guidance: Some(SET_PARAMETER_GUIDANCE),
    },
    CategoryRule {
        category: FailureCategory::DuplicateDefinition,
        triggers: &["already defined"],
        description: "An AMPL entity was defined twice, typically by feeding data through eval()",
        root_cause: "ampl.eval() was used for data instead of only the model",
        remediation: "Separate strictly: eval() once for the model, set[]/param[] for data",
        prevention: "Follow the model/data separation template",
        reprompt_guidance: Some(DUPLICATE_DEFINITION_GUIDANCE),
    },
    CategoryRule {
        category: FailureCategory::SyntaxError,
        triggers: &["syntax error", "invalid syntax"],
        description: "Syntax error in the AMPL model or the generated Python",
        root_cause: "Malformed AMPL statements or broken Python structure",
        remediation: "Use canonical AMPL statement forms; check semicolons and colons",
        prevention: "Generate from known-good AMPL statement templates",
        reprompt_guidance: None,
    },
    CategoryRule {
        category: FailureCategory::Infeasible,
        triggers: &["infeasible"],
        description: "The model admits no feasible solution",
        root_cause: "Contradictory constraints or unbalanced supply and demand",
        remediation: "Relax constraints, check balances, consider slack variables",
        prevention: "Validate supply/demand balance before solving",
        reprompt_guidance: Some(INFEASIBLE_GUIDANCE),
    },
    CategoryRule {
        category: FailureCategory::Unbounded,
        triggers: &["unbounded"],
        description: "The objective can improve without bound",
        root_cause: "Missing upper bounds or a reversed objective direction",
        remediation: "Add realistic bounds and verify the minimize/maximize direction",
        prevention: "Always define capacity limits for decision variables",
        reprompt_guidance: None,
    },
    CategoryRule {
        category: FailureCategory::Timeout,
        triggers: &["timeout"],
        description: "Execution exceeded the configured time limit",
        root_cause: "Overly complex model or inefficient formulation",
        remediation: "Simplify the formulation or tune solver settings",
        prevention: "Estimate problem size before generating the model",
        reprompt_guidance: None,
    },
    CategoryRule {
        category: FailureCategory::General,
        triggers: &[],
        description: "Failure could not be classified",
        root_cause: "No known trigger phrase matched the captured output",
        remediation: "Review imports, set/parameter consistency, and output encoding",
        prevention: "Follow the template-based generation workflow",
        reprompt_guidance: None,
    },
];

/// Structured explanation derived from a failure, owned by its attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FailureDiagnosis {
    pub category: FailureCategory,
    pub description: String,
    pub root_cause: String,
    pub remediation: String,
    pub prevention: String,
    /// Truncated copy of the raw technical detail.
    pub detail: String,
}

/// Classify a failure into the fixed taxonomy. Total: malformed or empty
/// input lands in [`FailureCategory::General`], never an error.
pub fn classify(failure: &str, output: &str) -> FailureDiagnosis {
    let haystack = format!("{}\n{}", failure, output).to_lowercase();
    let rule = CATEGORY_RULES
        .iter()
        .find(|rule| rule.triggers.iter().any(|t| haystack.contains(t)))
        .unwrap_or_else(|| rule_for_category(FailureCategory::General));

    let raw = if failure.trim().is_empty() { output } else { failure };
    diagnosis_from(rule, raw)
}

/// Diagnosis for failures that never produced executable output, e.g. a
/// generation-transport error. Always General, by policy.
pub fn general_failure(detail: &str) -> FailureDiagnosis {
    diagnosis_from(rule_for_category(FailureCategory::General), detail)
}

pub(crate) fn rule_for_category(category: FailureCategory) -> &'static CategoryRule {
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.category == category)
        .expect("every category has a table row")
}

fn diagnosis_from(rule: &CategoryRule, raw_detail: &str) -> FailureDiagnosis {
    FailureDiagnosis {
        category: rule.category,
        description: rule.description.to_string(),
        root_cause: rule.root_cause.to_string(),
        remediation: rule.remediation.to_string(),
        prevention: rule.prevention.to_string(),
        detail: truncate(raw_detail, DETAIL_MAX_CHARS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_trigger_phrase() {
        let cases = [
            ("Error: invalid subscript P['H']", FailureCategory::SetParameterMismatch),
            ("param cost is not defined", FailureCategory::SetParameterMismatch),
            ("set PRODUCTS is already defined", FailureCategory::DuplicateDefinition),
            ("syntax error at line 3", FailureCategory::SyntaxError),
            ("SyntaxError: invalid syntax", FailureCategory::SyntaxError),
            ("presolve: problem is infeasible", FailureCategory::Infeasible),
            ("objective is unbounded above", FailureCategory::Unbounded),
            ("timeout: execution exceeded 120 seconds", FailureCategory::Timeout),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(text, "").category, expected, "for {:?}", text);
        }
    }

    #[test]
    fn duplicate_definition_outranks_syntax_error() {
        let diagnosis = classify("x is already defined\nsyntax error near y", "");
        assert_eq!(diagnosis.category, FailureCategory::DuplicateDefinition);
    }

    #[test]
    fn set_parameter_outranks_duplicate_definition() {
        let diagnosis = classify("invalid subscript; name already defined", "");
        assert_eq!(diagnosis.category, FailureCategory::SetParameterMismatch);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            classify("SET X ALREADY DEFINED", "").category,
            FailureCategory::DuplicateDefinition
        );
    }

    #[test]
    fn auxiliary_output_is_searched_too() {
        let diagnosis = classify("process exited with code 1", "solver says: Infeasible");
        assert_eq!(diagnosis.category, FailureCategory::Infeasible);
    }

    #[test]
    fn unmatched_text_falls_back_to_general() {
        let diagnosis = classify("something inexplicable happened", "");
        assert_eq!(diagnosis.category, FailureCategory::General);
    }

    #[test]
    fn empty_input_is_general_not_an_error() {
        let diagnosis = classify("", "");
        assert_eq!(diagnosis.category, FailureCategory::General);
    }

    #[test]
    fn detail_is_truncated() {
        let long = "x".repeat(10_000);
        let diagnosis = classify(&long, "");
        assert!(diagnosis.detail.chars().count() <= DETAIL_MAX_CHARS);
        assert!(diagnosis.detail.ends_with("..."));
    }

    #[test]
    fn detail_falls_back_to_output_when_failure_empty() {
        let diagnosis = classify("", "stdout full of clues");
        assert_eq!(diagnosis.detail, "stdout full of clues");
    }

    #[test]
    fn general_failure_is_general_even_with_trigger_words() {
        let diagnosis = general_failure("provider timeout while connecting");
        assert_eq!(diagnosis.category, FailureCategory::General);
        assert!(diagnosis.detail.contains("provider timeout"));
    }

    #[test]
    fn fallback_row_is_last_and_triggerless() {
        let last = CATEGORY_RULES.last().unwrap();
        assert_eq!(last.category, FailureCategory::General);
        assert!(last.triggers.is_empty());
    }

    #[test]
    fn every_category_has_a_rule() {
        for category in [
            FailureCategory::SetParameterMismatch,
            FailureCategory::DuplicateDefinition,
            FailureCategory::SyntaxError,
            FailureCategory::Infeasible,
            FailureCategory::Unbounded,
            FailureCategory::Timeout,
            FailureCategory::General,
        ] {
            assert_eq!(rule_for_category(category).category, category);
        }
    }
}
