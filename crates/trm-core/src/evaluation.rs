use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::candidate::{ApplyError, Candidate, CandidateApplier};
use crate::parsers::{parse_performance_metric, parse_test_output, TestResults};
use crate::scoring::{calculate_weighted_score, should_halt, update_ema_score, HaltReason};
use crate::session::Session;
use crate::subprocess;

/// A parsed performance observation, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PerfResult {
    pub value: f64,
    pub unit: String,
}

/// The record appended to a session's history per completed iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub step: u32,
    pub score: f64,
    pub ema_score: f64,
    pub ok_data_quality: Option<bool>,
    pub ok_lint: Option<bool>,
    pub tests: Option<TestResults>,
    pub perf: Option<PerfResult>,
    pub feedback: Vec<String>,
    pub should_halt: bool,
    pub reasons: Vec<String>,
}

const STDERR_TRUNCATE: usize = 500;

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = s.char_indices().nth(max).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..cut])
    }
}

fn tail_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Apply `candidate` to the session's repository, then run all configured
/// probes, score the result, update the session's iteration state, and
/// append the new `EvalResult` to its history.
///
/// If the candidate cannot be applied, the session is left completely
/// unchanged and the error is returned to the caller — no partial
/// evaluation state is ever written.
pub async fn run_evaluation(
    session: &mut Session,
    applier: &dyn CandidateApplier,
    candidate: &Candidate,
) -> Result<EvalResult, ApplyError> {
    applier.apply(&session.config.repo_path, candidate).await?;

    let mut feedback = Vec::new();
    let cwd: &Path = session.config.repo_path.as_path();
    let timeout = session.config.timeout_sec;

    let ok_data_quality = match &session.config.data_quality_cmd {
        Some(cmd) => {
            let result = subprocess::run(cmd, cwd, timeout, None).await;
            if result.ok {
                feedback.push("✅ Data quality passed".to_string());
            } else {
                feedback.push(format!(
                    "❌ Data quality failed: {}",
                    truncate(&result.stderr, STDERR_TRUNCATE)
                ));
            }
            Some(result.ok)
        }
        None => None,
    };

    let tests = match &session.config.test_cmd {
        Some(cmd) => {
            let result = subprocess::run(cmd, cwd, timeout, None).await;
            let combined = format!("{}\n{}", result.stdout, result.stderr);
            match parse_test_output(&combined, "pytest") {
                Some(t) if t.failed == 0 => {
                    feedback.push(format!("✅ Tests: {}/{} passed", t.passed, t.total));
                    Some(t)
                }
                Some(t) => {
                    feedback.push(format!("❌ Tests: {}/{} failed", t.failed, t.total));
                    Some(t)
                }
                None => {
                    feedback.push("⚠️ Could not parse test output".to_string());
                    None
                }
            }
        }
        None => None,
    };

    let ok_lint = match &session.config.lint_cmd {
        Some(cmd) => {
            let result = subprocess::run(cmd, cwd, timeout, None).await;
            if result.ok {
                feedback.push("✅ Lint passed".to_string());
            } else {
                feedback.push(format!(
                    "❌ Lint failed:\n{}",
                    tail_lines(&result.stderr, 5)
                ));
            }
            Some(result.ok)
        }
        None => None,
    };

    let perf = match &session.config.perf_cmd {
        Some(cmd) => {
            let result = subprocess::run(cmd, cwd, timeout, None).await;
            let combined = format!("{}\n{}", result.stdout, result.stderr);
            match parse_performance_metric(&combined) {
                Some(value) => {
                    match session.best_perf {
                        Some(best) if value < best => {
                            feedback.push(format!("⚡ Perf: {value:.3}s (improved from {best:.3}s)"));
                            session.best_perf = Some(value);
                        }
                        Some(best) => {
                            feedback.push(format!("⚡ Perf: {value:.3}s (regressed from {best:.3}s)"));
                        }
                        None => {
                            feedback.push(format!("⚡ Perf: {value:.3}s (baseline)"));
                            session.best_perf = Some(value);
                        }
                    }
                    Some(PerfResult {
                        value,
                        unit: "seconds".to_string(),
                    })
                }
                None => {
                    feedback.push("⚠️ Could not parse performance output".to_string());
                    None
                }
            }
        }
        None => None,
    };

    let score = calculate_weighted_score(
        ok_data_quality,
        ok_lint,
        tests,
        perf.as_ref().map(|p| p.value),
        &session.config.weights,
        session.best_perf,
    );

    let prev_ema = if session.step == 0 { score } else { session.ema_score };
    let ema_score = update_ema_score(score, prev_ema, session.config.ema_alpha);

    let new_step = session.step + 1;
    let improved = score > session.best_score;
    let no_improve_streak = if improved { 0 } else { session.no_improve_streak + 1 };
    let best_score = if improved { score } else { session.best_score };

    let tests_passed = matches!(tests, Some(t) if t.failed == 0);
    let (halt, reason, message) = should_halt(new_step, score, no_improve_streak, tests_passed, &session.config.halt);
    let reasons = vec![message];
    let _ = reason; // carried in `reasons`; kept distinct for callers that branch on it

    session.step = new_step;
    session.best_score = best_score;
    session.ema_score = ema_score;
    session.no_improve_streak = no_improve_streak;

    let result = EvalResult {
        step: new_step,
        score,
        ema_score,
        ok_data_quality,
        ok_lint,
        tests,
        perf,
        feedback,
        should_halt: halt,
        reasons,
    };

    session.history.push(result.clone());

    Ok(result)
}
