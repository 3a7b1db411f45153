use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured test outcome. Absent (`None`) when the raw output could not
/// be parsed by any known format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResults {
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
}

/// Parse test-runner output into `{passed, failed, total}`.
///
/// `framework` is one of `"pytest"`, `"unittest"`, or anything else (which
/// tries pytest, then unittest).
pub fn parse_test_output(raw: &str, framework: &str) -> Option<TestResults> {
    match framework {
        "pytest" => parse_pytest(raw),
        "unittest" => parse_unittest(raw),
        _ => parse_pytest(raw).or_else(|| parse_unittest(raw)),
    }
}

fn parse_pytest(raw: &str) -> Option<TestResults> {
    if let Some(result) = parse_pytest_json(raw) {
        return Some(result);
    }

    let passed_re = Regex::new(r"(\d+)\s+passed").ok()?;
    let failed_re = Regex::new(r"(\d+)\s+failed").ok()?;
    let passed = passed_re
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse::<u32>().ok());
    let failed = failed_re
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse::<u32>().ok());

    if passed.is_some() || failed.is_some() {
        let passed = passed.unwrap_or(0);
        let failed = failed.unwrap_or(0);
        return Some(TestResults {
            passed,
            failed,
            total: passed + failed,
        });
    }

    let lowered = raw.to_lowercase();
    if lowered.contains("no tests ran") || lowered.contains("no tests collected") {
        return Some(TestResults {
            passed: 0,
            failed: 0,
            total: 0,
        });
    }

    None
}

fn parse_pytest_json(raw: &str) -> Option<TestResults> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let obj = value.as_object()?;
    let summary = obj
        .get("tests")
        .and_then(Value::as_object)
        .or_else(|| obj.get("summary").and_then(Value::as_object))?;

    let passed = summary.get("passed")?.as_u64()? as u32;
    let failed = summary.get("failed")?.as_u64()? as u32;
    let total = summary
        .get("total")
        .and_then(Value::as_u64)
        .map(|t| t as u32)
        .unwrap_or(passed + failed);

    Some(TestResults {
        passed,
        failed,
        total,
    })
}

fn parse_unittest(raw: &str) -> Option<TestResults> {
    let ran_re = Regex::new(r"Ran\s+(\d+)\s+test").ok()?;
    let total = ran_re
        .captures(raw)?
        .get(1)?
        .as_str()
        .parse::<u32>()
        .ok()?;

    if Regex::new(r"(?m)^OK\s*$").ok()?.is_match(raw) {
        return Some(TestResults {
            passed: total,
            failed: 0,
            total,
        });
    }

    let failures_re = Regex::new(r"failures=(\d+)").ok()?;
    let errors_re = Regex::new(r"errors=(\d+)").ok()?;
    let failures: u32 = failures_re
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
        .unwrap_or(0);
    let errors: u32 = errors_re
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
        .unwrap_or(0);
    let failed = (failures + errors).min(total);

    Some(TestResults {
        passed: total - failed,
        failed,
        total,
    })
}

/// Parse a benchmark/perf command's output into a scalar seconds value.
///
/// Tries, in order: JSON with a known time key (with a ms-vs-seconds
/// heuristic), unit-suffixed regex patterns (ms before s before m, so "ms"
/// never matches the seconds pattern first), then a bare numeric line.
pub fn parse_performance_metric(raw: &str) -> Option<f64> {
    if let Some(seconds) = parse_perf_json(raw) {
        return Some(seconds);
    }

    if let Some(ms) = Regex::new(r"([0-9]*\.?[0-9]+)\s*ms")
        .ok()?
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())
    {
        return Some(ms * 0.001);
    }

    if let Some(secs) = Regex::new(r"([0-9]*\.?[0-9]+)\s*(?:s|sec|seconds?)\b")
        .ok()?
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())
    {
        return Some(secs);
    }

    if let Some(mins) = Regex::new(r"([0-9]*\.?[0-9]+)\s*(?:m|min|minutes?)\b")
        .ok()?
        .captures(raw)
        .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())
    {
        return Some(mins * 60.0);
    }

    let bare_re = Regex::new(r"(?m)^\s*([0-9]*\.?[0-9]+)\s*$").ok()?;
    if let Some(caps) = bare_re.captures(raw) {
        return caps[1].parse::<f64>().ok();
    }

    None
}

fn parse_perf_json(raw: &str) -> Option<f64> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let obj = value.as_object()?;
    const KEYS: [&str; 5] = ["time", "duration", "runtime", "elapsed", "seconds"];
    for key in KEYS {
        if let Some(n) = obj.get(key).and_then(Value::as_f64) {
            return Some(if n >= 10_000.0 { n / 1000.0 } else { n });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pytest_passed_and_failed() {
        let r = parse_test_output("5 passed, 2 failed in 1.2s", "pytest").unwrap();
        assert_eq!(r, TestResults { passed: 5, failed: 2, total: 7 });
    }

    #[test]
    fn pytest_all_passed() {
        let r = parse_test_output("10 passed in 0.5s", "pytest").unwrap();
        assert_eq!(r, TestResults { passed: 10, failed: 0, total: 10 });
    }

    #[test]
    fn pytest_no_tests_collected() {
        let r = parse_test_output("no tests ran", "pytest").unwrap();
        assert_eq!(r, TestResults { passed: 0, failed: 0, total: 0 });
    }

    #[test]
    fn pytest_json_summary() {
        let raw = r#"{"tests": {"passed": 3, "failed": 1, "total": 4}}"#;
        let r = parse_test_output(raw, "pytest").unwrap();
        assert_eq!(r, TestResults { passed: 3, failed: 1, total: 4 });
    }

    #[test]
    fn pytest_json_total_defaults_to_sum() {
        let raw = r#"{"summary": {"passed": 3, "failed": 1}}"#;
        let r = parse_test_output(raw, "pytest").unwrap();
        assert_eq!(r.total, 4);
    }

    #[test]
    fn pytest_unparseable_is_absent() {
        assert!(parse_test_output("garbage output with no markers", "pytest").is_none());
    }

    #[test]
    fn unittest_ok() {
        let raw = "Ran 12 tests in 0.3s\n\nOK";
        let r = parse_test_output(raw, "unittest").unwrap();
        assert_eq!(r, TestResults { passed: 12, failed: 0, total: 12 });
    }

    #[test]
    fn unittest_failures() {
        let raw = "Ran 12 tests in 0.3s\n\nFAILED (failures=2)";
        let r = parse_test_output(raw, "unittest").unwrap();
        assert_eq!(r, TestResults { passed: 10, failed: 2, total: 12 });
    }

    #[test]
    fn unittest_errors() {
        let raw = "Ran 5 tests in 0.1s\n\nFAILED (errors=1)";
        let r = parse_test_output(raw, "unittest").unwrap();
        assert_eq!(r, TestResults { passed: 4, failed: 1, total: 5 });
    }

    #[test]
    fn unittest_without_ran_line_is_absent() {
        assert!(parse_test_output("nothing useful here", "unittest").is_none());
    }

    #[test]
    fn unknown_framework_falls_back_through_both() {
        let raw = "Ran 3 tests in 0.1s\n\nOK";
        let r = parse_test_output(raw, "go-test").unwrap();
        assert_eq!(r.total, 3);
    }

    #[test]
    fn perf_ms_suffix() {
        assert_eq!(parse_performance_metric("123.45 ms"), Some(0.12345));
    }

    #[test]
    fn perf_seconds_suffix() {
        assert_eq!(parse_performance_metric("1.5s"), Some(1.5));
    }

    #[test]
    fn perf_minutes_suffix() {
        assert_eq!(parse_performance_metric("2 min"), Some(120.0));
    }

    #[test]
    fn perf_bare_number_assumed_seconds() {
        assert_eq!(parse_performance_metric("3.2"), Some(3.2));
    }

    #[test]
    fn perf_json_seconds() {
        let raw = r#"{"duration": 4.2}"#;
        assert_eq!(parse_performance_metric(raw), Some(4.2));
    }

    #[test]
    fn perf_json_large_value_treated_as_ms() {
        let raw = r#"{"elapsed": 12000}"#;
        assert_eq!(parse_performance_metric(raw), Some(12.0));
    }

    #[test]
    fn perf_unparseable_is_absent() {
        assert!(parse_performance_metric("no numbers here at all").is_none());
    }

    #[test]
    fn perf_ms_checked_before_seconds_pattern() {
        // "ms" must not be matched by the seconds pattern first.
        assert_eq!(parse_performance_metric("500ms"), Some(0.5));
    }
}
