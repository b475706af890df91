//! Attempt orchestration: the generate -> sanitize -> execute -> classify
//! -> decide loop.
//!
//! The loop is strictly sequential: one attempt in flight, an append-only
//! history, and the run counters (generation time, reprompt count) are
//! locals threaded into the final [`RunResult`] rather than ambient state,
//! so independent runs never interfere.

use crate::diagnose::{classify, general_failure, FailureCategory, FailureDiagnosis};
use crate::llm::Generator;
use crate::prompt;
use crate::retry;
use crate::sandbox::{CodeRunner, ExecOutcome};
use crate::sanitize::{sanitize, RepairAction};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_attempts: u32,
    pub temperature: f32,
    /// Narrate per-attempt progress to stderr.
    pub verbose: bool,
}

/// One generate -> sanitize -> execute -> classify cycle, immutable once
/// appended to the history.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub number: u32,
    pub generation_secs: f64,
    /// Sanitized code; `None` when the generation call itself failed.
    pub code: Option<String>,
    pub repairs: Vec<RepairAction>,
    /// Execution outcome; `None` when nothing was executed.
    pub outcome: Option<ExecOutcome>,
    /// Present only when the attempt did not succeed cleanly.
    pub diagnosis: Option<FailureDiagnosis>,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().map(|o| o.success).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    Solved,
    Exhausted,
    Declined,
}

/// Terminal aggregate of one run, finalized exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub attempts: Vec<Attempt>,
    pub success: bool,
    pub termination: Termination,
    pub rationale: String,
    /// The winning sanitized code, when the run succeeded.
    pub solution: Option<String>,
    pub total_generation_secs: f64,
    pub reprompts: u32,
}

impl RunResult {
    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }

    /// Failure categories in attempt order.
    pub fn category_history(&self) -> Vec<FailureCategory> {
        self.attempts
            .iter()
            .filter_map(|a| a.diagnosis.as_ref().map(|d| d.category))
            .collect()
    }
}

/// Drive the bounded attempt loop for one task.
///
/// Attempt numbers are contiguous from 1; the loop halts the moment an
/// execution succeeds, when the policy declines, or when the budget is
/// spent, whichever comes first.
pub async fn run_task<G: Generator, R: CodeRunner>(
    generator: &G,
    runner: &R,
    config: &RunConfig,
    task: &str,
) -> RunResult {
    let max_attempts = config.max_attempts.max(1);
    let mut attempts: Vec<Attempt> = Vec::new();
    let mut total_generation_secs = 0.0;
    let mut reprompts: u32 = 0;
    let mut last_diagnosis: Option<FailureDiagnosis> = None;
    let mut last_code = String::new();

    for number in 1..=max_attempts {
        let request = match &last_diagnosis {
            None => prompt::initial_prompt(task),
            Some(diagnosis) => {
                reprompts += 1;
                prompt::reprompt(diagnosis, task, &last_code, number)
            }
        };

        if config.verbose {
            eprintln!("--- attempt {}/{}", number, max_attempts);
        }

        let (attempt, diagnosis) = match generator.generate(&request, config.temperature).await {
            Err(err) => {
                // Transport failure: no code, no execution, no generation
                // time counted. Classified General by policy.
                if config.verbose {
                    eprintln!("  generation failed: {:#}", err);
                }
                let diagnosis = general_failure(&format!("{:#}", err));
                let attempt = Attempt {
                    number,
                    generation_secs: 0.0,
                    code: None,
                    repairs: Vec::new(),
                    outcome: None,
                    diagnosis: Some(diagnosis.clone()),
                };
                (attempt, diagnosis)
            }
            Ok(generation) => {
                let generation_secs = generation.elapsed.as_secs_f64();
                total_generation_secs += generation_secs;
                let (code, repairs) = sanitize(&generation.text);
                if config.verbose {
                    eprintln!("  generated in {:.1}s", generation_secs);
                    if !repairs.is_empty() {
                        let labels: Vec<String> =
                            repairs.iter().map(|r| r.to_string()).collect();
                        eprintln!("  repairs: {}", labels.join(", "));
                    }
                }

                let outcome = runner.run(&code);
                if outcome.success {
                    if config.verbose {
                        eprintln!("  execution succeeded");
                    }
                    attempts.push(Attempt {
                        number,
                        generation_secs,
                        code: Some(code.clone()),
                        repairs,
                        outcome: Some(outcome),
                        diagnosis: None,
                    });
                    return RunResult {
                        attempts,
                        success: true,
                        termination: Termination::Solved,
                        rationale: "solved".to_string(),
                        solution: Some(code),
                        total_generation_secs,
                        reprompts,
                    };
                }

                let failure = outcome.failure.clone().unwrap_or_default();
                let diagnosis = classify(&failure, &outcome.stdout);
                if config.verbose {
                    eprintln!("  execution failed: {}", diagnosis.category);
                }
                let attempt = Attempt {
                    number,
                    generation_secs,
                    code: Some(code.clone()),
                    repairs,
                    outcome: Some(outcome),
                    diagnosis: Some(diagnosis.clone()),
                };
                last_code = code;
                (attempt, diagnosis)
            }
        };

        attempts.push(attempt);

        let decision = retry::decide(diagnosis.category, number, max_attempts);
        if config.verbose {
            eprintln!("  decision: {}", decision.rationale);
        }
        if !decision.proceed {
            let termination = if number >= max_attempts {
                Termination::Exhausted
            } else {
                Termination::Declined
            };
            return RunResult {
                attempts,
                success: false,
                termination,
                rationale: decision.rationale,
                solution: None,
                total_generation_secs,
                reprompts,
            };
        }
        last_diagnosis = Some(diagnosis);
    }

    // The policy stops at number == max_attempts, so the loop returns above.
    RunResult {
        attempts,
        success: false,
        termination: Termination::Exhausted,
        rationale: retry::MAX_ATTEMPTS_RATIONALE.to_string(),
        solution: None,
        total_generation_secs,
        reprompts,
    }
}
