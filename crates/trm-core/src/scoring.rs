use serde::{Deserialize, Serialize};

use crate::parsers::TestResults;

/// Relative weight of each probe's contribution to the aggregate score.
/// Non-negative; need not sum to 1 (the aggregate renormalizes over
/// whichever signals are actually present).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct WeightsConfig {
    pub data_quality: f64,
    pub test: f64,
    pub lint: f64,
    pub perf: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        WeightsConfig {
            data_quality: 0.3,
            test: 0.4,
            lint: 0.1,
            perf: 0.2,
        }
    }
}

/// Halting policy. `min_steps` guards against a lucky first iteration
/// halting the loop before the agent has had a chance to iterate at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct HaltConfig {
    pub max_steps: u32,
    pub pass_threshold: f64,
    pub patience_no_improve: u32,
    pub min_steps: u32,
}

impl Default for HaltConfig {
    fn default() -> Self {
        HaltConfig {
            max_steps: 12,
            pass_threshold: 0.95,
            patience_no_improve: 3,
            min_steps: 1,
        }
    }
}

/// Compute the weighted aggregate score in `[0, 1]` over whichever signals
/// are present. Weights are renormalized over the present signals only;
/// a signal that was never configured (or failed to parse) contributes
/// neither its weight nor its score to the aggregate.
///
/// `best_perf`, when known and positive, is used as the baseline for the
/// performance signal: `s_perf = min(1, best_perf / perf_value)`. The
/// very first performance observation (no prior best) scores `1.0`.
pub fn calculate_weighted_score(
    ok_data_quality: Option<bool>,
    ok_lint: Option<bool>,
    tests: Option<TestResults>,
    perf_value: Option<f64>,
    weights: &WeightsConfig,
    best_perf: Option<f64>,
) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    if let Some(ok) = ok_data_quality {
        let s = if ok { 1.0 } else { 0.0 };
        weighted_sum += weights.data_quality * s;
        weight_total += weights.data_quality;
    }

    if let Some(t) = tests {
        if t.total > 0 {
            let s = t.passed as f64 / t.total as f64;
            weighted_sum += weights.test * s;
            weight_total += weights.test;
        }
    }

    if let Some(ok) = ok_lint {
        let s = if ok { 1.0 } else { 0.0 };
        weighted_sum += weights.lint * s;
        weight_total += weights.lint;
    }

    if let Some(value) = perf_value {
        if value > 0.0 {
            let s = match best_perf {
                Some(best) if best > 0.0 => (best / value).min(1.0),
                _ => 1.0,
            };
            weighted_sum += weights.perf * s;
            weight_total += weights.perf;
        }
    }

    if weight_total <= 0.0 {
        return 0.0;
    }

    weighted_sum / weight_total
}

/// Update the exponential moving average of the score.
///
/// `ema_1 = score_1` (the first observation seeds the filter); thereafter
/// `ema_new = alpha * score + (1 - alpha) * ema_prev`. Callers on the
/// first step should pass `prev_ema == score` to get this for free.
pub fn update_ema_score(current_score: f64, prev_ema: f64, alpha: f64) -> f64 {
    alpha * current_score + (1.0 - alpha) * prev_ema
}

/// Why the loop halted, or that it should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Success,
    Plateau,
    Limit,
    Continue,
}

/// Evaluate the halting predicates in priority order: success, then
/// plateau, then step limit, else continue. Only the first matching
/// predicate is reported.
pub fn should_halt(
    step: u32,
    score: f64,
    no_improve_streak: u32,
    tests_passed: bool,
    halt: &HaltConfig,
) -> (bool, HaltReason, String) {
    if step >= halt.min_steps && tests_passed && score >= halt.pass_threshold {
        return (
            true,
            HaltReason::Success,
            format!("✅ Success: score {score:.3} >= threshold {:.3} at step {step}", halt.pass_threshold),
        );
    }

    if no_improve_streak >= halt.patience_no_improve {
        return (
            true,
            HaltReason::Plateau,
            format!(
                "⏸️ Plateau: no improvement for {no_improve_streak} steps (patience {})",
                halt.patience_no_improve
            ),
        );
    }

    if step >= halt.max_steps {
        return (
            true,
            HaltReason::Limit,
            format!("⏱️ Limit: reached max_steps ({})", halt.max_steps),
        );
    }

    (
        false,
        HaltReason::Continue,
        format!("🔄 Continue: step {step}/{}", halt.max_steps),
    )
}
