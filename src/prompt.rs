//! Prompt construction: the first-attempt request and the corrective
//! reprompt built from a failure diagnosis.

use crate::diagnose::{rule_for_category, FailureDiagnosis, GENERAL_GUIDANCE};
use crate::util::truncate;

const PRIOR_CODE_MAX_CHARS: usize = 4_000;

/// Hard constraints appended to every generation request.
const GLOBAL_CONSTRAINTS: &str = r#"HARD REQUIREMENTS (every attempt):
- Use ONLY amplpy. No pulp, scipy, gurobipy, cvxpy, ortools, or pyomo.
- Initialize exactly: from amplpy import AMPL, modules; modules.install(); ampl = AMPL()
- Keep model structure strictly separate from data: the model is one string
  passed to ampl.eval() exactly once; ALL sets and parameters are assigned
  from Python via ampl.set[...] and ampl.param[...].
- Console output must be plain ASCII (write ->, never unicode arrows).
- Before solving, write the AMPL model string to 'model.mod' and a plain-text
  dump of the assigned data to 'data.dat' in the working directory.
- Read solved values with the canonical pattern:
    values = ampl.getVariable('x').getValues().toDict()
    for key, val in values.items(): print(key, val)"#;

/// Build the plain first-attempt request from the task text.
pub fn initial_prompt(task: &str) -> String {
    format!(
        r#"Solve this optimization problem with AMPL and Python:

{task}

Produce complete, directly runnable Python code that:
- imports amplpy, calls modules.install(), and creates ampl = AMPL()
- declares sets, parameters, variables, objective, and constraints in one
  AMPL model string (definitions only, no data values in the model)
- assigns all data from Python via ampl.set[...] and ampl.param[...]
- declares decision variables as integer where appropriate, e.g.
  var x {{A, S}} integer >= 0;
- calls ampl.setOption('solver', 'highs') before ampl.solve()
- measures the time around ampl.solve() and prints the solver runtime
- prints the objective value and every variable value by looping over the
  index sets

{GLOBAL_CONSTRAINTS}

Return ONLY Python code."#
    )
}

/// Build the corrective regeneration request for attempt `attempt`.
///
/// Fixed section order: corrective framing with the diagnosis, the
/// category-specific fix instructions, the prior failing code (when the
/// failed attempt produced any), the original task verbatim, and the global
/// constraints block.
pub fn reprompt(
    diagnosis: &FailureDiagnosis,
    task: &str,
    prior_code: &str,
    attempt: u32,
) -> String {
    let guidance = rule_for_category(diagnosis.category)
        .reprompt_guidance
        .unwrap_or(GENERAL_GUIDANCE);
    // No code exists after a failed generation call; skip the section
    // rather than show an empty block.
    let prior_section = if prior_code.trim().is_empty() {
        String::new()
    } else {
        format!(
            "PREVIOUS FAILING CODE (for reference, do not repeat its mistake):\n{}\n\n",
            truncate(prior_code, PRIOR_CODE_MAX_CHARS)
        )
    };

    format!(
        r#"CORRECTIVE REGENERATION - ATTEMPT {attempt}

The code from attempt {previous} failed.
CATEGORY: {category}
DESCRIPTION: {description}
ROOT CAUSE: {root_cause}
REMEDIATION: {remediation}
TECHNICAL DETAIL:
{detail}

{guidance}

{prior_section}ORIGINAL TASK:
{task}

{GLOBAL_CONSTRAINTS}

Return ONLY Python code."#,
        previous = attempt.saturating_sub(1),
        category = diagnosis.category,
        description = diagnosis.description,
        root_cause = diagnosis.root_cause,
        remediation = diagnosis.remediation,
        detail = diagnosis.detail,
    )
}
