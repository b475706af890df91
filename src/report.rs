//! Rendering and persistence of run artifacts.
//!
//! The naming scheme is a pure function of temperature, timestamp, and run
//! id, kept apart from the loop so the orchestrator stays indifferent to
//! file naming and format. Artifacts: a JSON record of the full run, a
//! human-readable failure-analysis report, and, when the run succeeded, the
//! winning code plus the model and data files it left behind.

use crate::run::{RunResult, Termination};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DETAIL_PREVIEW_LINES: usize = 5;

/// Failure-category counts over the attempt history, by label.
pub fn category_counts(result: &RunResult) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for category in result.category_history() {
        *counts.entry(category.label()).or_insert(0) += 1;
    }
    counts
}

/// Pure naming scheme for run artifacts: temperature tag, local timestamp,
/// short run id. E.g. `optiforge_T06_20260829_141502_1f3a9c2e`.
pub fn artifact_stem(temperature: f32, at: DateTime<Local>, run_id: &Uuid) -> String {
    let temp_tag = format!("T{}", temperature.to_string().replace('.', ""));
    let short_id = &run_id.simple().to_string()[..8];
    format!(
        "optiforge_{}_{}_{}",
        temp_tag,
        at.format("%Y%m%d_%H%M%S"),
        short_id
    )
}

/// Render the human-readable run report.
pub fn render_text_report(result: &RunResult) -> String {
    let mut out = String::new();
    let rule = "=".repeat(70);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "OPTIFORGE RUN REPORT");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);

    let _ = writeln!(out, "ATTEMPT OVERVIEW");
    let _ = writeln!(out, "{}", "-".repeat(50));
    for attempt in &result.attempts {
        let status = if attempt.succeeded() { "OK " } else { "FAIL" };
        let _ = writeln!(
            out,
            "attempt {}: {} (generation {:.1}s)",
            attempt.number, status, attempt.generation_secs
        );
        if !attempt.repairs.is_empty() {
            let labels: Vec<String> = attempt.repairs.iter().map(|r| r.to_string()).collect();
            let _ = writeln!(out, "  repairs: {}", labels.join(", "));
        }
    }
    let _ = writeln!(out);

    let failed: Vec<_> = result
        .attempts
        .iter()
        .filter(|a| a.diagnosis.is_some())
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "FAILURE ANALYSIS");
        let _ = writeln!(out, "{}", "-".repeat(50));
        for attempt in &failed {
            let Some(diagnosis) = &attempt.diagnosis else {
                continue;
            };
            let _ = writeln!(out, "attempt {}:", attempt.number);
            let _ = writeln!(out, "  category:    {}", diagnosis.category);
            let _ = writeln!(out, "  description: {}", diagnosis.description);
            let _ = writeln!(out, "  root cause:  {}", diagnosis.root_cause);
            let _ = writeln!(out, "  remediation: {}", diagnosis.remediation);
            let _ = writeln!(out, "  prevention:  {}", diagnosis.prevention);
            let detail_lines: Vec<&str> =
                diagnosis.detail.lines().take(DETAIL_PREVIEW_LINES).collect();
            if !detail_lines.is_empty() {
                let _ = writeln!(out, "  detail:");
                for line in &detail_lines {
                    let _ = writeln!(out, "    {}", line);
                }
                if diagnosis.detail.lines().count() > DETAIL_PREVIEW_LINES {
                    let _ = writeln!(out, "    [... full detail in the JSON report]");
                }
            }
            let _ = writeln!(out);
        }

        let counts = category_counts(result);
        if !counts.is_empty() {
            let _ = writeln!(out, "FAILURE CATEGORIES");
            let _ = writeln!(out, "{}", "-".repeat(50));
            for (label, count) in counts {
                let _ = writeln!(out, "  {}: {}x", label, count);
            }
            let _ = writeln!(out);
        }
    }

    let succeeded = result.attempts.iter().filter(|a| a.succeeded()).count();
    let success_rate = if result.attempts.is_empty() {
        0.0
    } else {
        succeeded as f64 / result.attempts.len() as f64 * 100.0
    };

    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}", "-".repeat(50));
    let _ = writeln!(out, "  attempts:        {}", result.total_attempts());
    let _ = writeln!(out, "  reprompts:       {}", result.reprompts);
    let _ = writeln!(
        out,
        "  generation time: {:.1}s",
        result.total_generation_secs
    );
    let _ = writeln!(out, "  success rate:    {:.1}%", success_rate);
    let status = match result.termination {
        Termination::Solved => "solved",
        Termination::Exhausted => "not solved (budget exhausted)",
        Termination::Declined => "not solved (retry declined)",
    };
    let _ = writeln!(out, "  status:          {}", status);
    let _ = writeln!(out, "  rationale:       {}", result.rationale);

    out
}

/// Write the run artifacts into `dir`, returning the paths written.
pub fn write_artifacts(dir: &Path, result: &RunResult, temperature: f32) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;

    let stem = artifact_stem(temperature, Local::now(), &Uuid::new_v4());
    let mut written = Vec::new();

    let json_path = dir.join(format!("{}.json", stem));
    let json =
        serde_json::to_string_pretty(result).context("failed to serialize run result")?;
    fs::write(&json_path, json)
        .with_context(|| format!("failed to write '{}'", json_path.display()))?;
    written.push(json_path);

    let report_path = dir.join(format!("{}.txt", stem));
    fs::write(&report_path, render_text_report(result))
        .with_context(|| format!("failed to write '{}'", report_path.display()))?;
    written.push(report_path);

    if let Some(code) = &result.solution {
        let code_path = dir.join(format!("{}.py", stem));
        let contents = format!(
            "# Final solution generated by optiforge\n# attempts: {}, reprompts: {}\n\n{}\n",
            result.total_attempts(),
            result.reprompts,
            code
        );
        fs::write(&code_path, contents)
            .with_context(|| format!("failed to write '{}'", code_path.display()))?;
        written.push(code_path);

        // Model and data files captured from the winning execution.
        let outcome = result
            .attempts
            .iter()
            .rev()
            .find(|a| a.succeeded())
            .and_then(|a| a.outcome.as_ref());
        if let Some(outcome) = outcome {
            for (contents, extension) in [(&outcome.model, "mod"), (&outcome.data, "dat")] {
                if let Some(contents) = contents {
                    let path = dir.join(format!("{}.{}", stem, extension));
                    fs::write(&path, contents)
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                    written.push(path);
                }
            }
        }
    }

    Ok(written)
}
