use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use trm_core::candidate::{Candidate, CandidateApplier, FilesApplier};
use trm_core::config::DefaultsConfig;
use trm_core::evaluation::{run_evaluation, EvalResult, PerfResult};
use trm_core::parsers::TestResults;
use trm_core::preflight::{run_preflight, PreflightReport};
use trm_core::scoring::{HaltConfig, WeightsConfig};
use trm_core::session::{SessionConfig, SessionRegistry};
use trm_core::TrmError;

use crate::translate;

type DispatchResult<T> = Result<T, TrmError>;

/// Routes a named operation + its (already short-name-translated by the
/// caller) JSON argument object to the matching handler, and maps the
/// handler's `Result` into the `{ok:true,result}` / `{ok:false,error}`
/// response envelope. Handler panics are not caught here — `main`'s task
/// boundary is where an unexpected panic would be contained instead, since
/// ordinary failure modes never need to unwind.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    applier: Arc<dyn CandidateApplier>,
    defaults: DefaultsConfig,
}

impl Dispatcher {
    pub fn new(defaults: DefaultsConfig) -> Self {
        Dispatcher {
            registry: Arc::new(SessionRegistry::new()),
            applier: Arc::new(FilesApplier),
            defaults,
        }
    }

    pub async fn dispatch(&self, op: &str, raw_args: Value) -> Value {
        let result = match op {
            "start" => self.handle_start(translate::translate_start(&raw_args)).await,
            "submit" => self.handle_submit(translate::translate_submit(&raw_args)).await,
            "state" => self.handle_state(translate::translate_session_id(&raw_args)).await,
            "halt" => self.handle_halt(translate::translate_session_id(&raw_args)).await,
            "end" => self.handle_end(translate::translate_session_id(&raw_args)).await,
            "read" => self.handle_read(translate::translate_read(&raw_args)).await,
            "validate" | "suggest" | "reset" | "undo" | "fix" => {
                self.handle_placeholder(translate::translate_session_id(&raw_args)).await
            }
            "checkpointSave" => self.handle_placeholder(translate::translate_checkpoint_save(&raw_args)).await,
            "checkpointRestore" => {
                self.handle_placeholder(translate::translate_checkpoint_restore(&raw_args)).await
            }
            "checkpointList" => self.handle_placeholder(translate::translate_session_id(&raw_args)).await,
            "lines" => self.handle_placeholder(translate::translate_lines(&raw_args)).await,
            "review" => self.handle_placeholder(translate::translate_review(&raw_args)).await,
            other => Err(TrmError::Validation(format!("unsupported operation: {other}"))),
        };

        match result {
            Ok(value) => json!({"ok": true, "result": value}),
            Err(err) => json!({"ok": false, "error": err.to_string()}),
        }
    }

    async fn handle_start(&self, args: Value) -> DispatchResult<Value> {
        let parsed: StartArgs = serde_json::from_value(args)
            .map_err(|e| TrmError::Validation(format!("invalid start arguments: {e}")))?;

        let weights = merge_weights(parsed.weights, &self.defaults.weights);
        let halt = HaltConfig {
            max_steps: parsed.halt.max_steps,
            pass_threshold: parsed.halt.pass_threshold,
            patience_no_improve: parsed.halt.patience_no_improve,
            min_steps: parsed.halt.min_steps.unwrap_or(self.defaults.halt.min_steps),
        };

        let config = SessionConfig {
            repo_path: PathBuf::from(parsed.repo_path),
            data_quality_cmd: parsed.data_quality_cmd,
            test_cmd: parsed.test_cmd,
            lint_cmd: parsed.lint_cmd,
            perf_cmd: parsed.perf_cmd,
            timeout_sec: parsed.timeout_sec.unwrap_or(self.defaults.timeout_sec),
            weights,
            halt,
            ema_alpha: parsed.ema_alpha.unwrap_or(self.defaults.ema_alpha),
        };

        let run_preflight_check = parsed.preflight.unwrap_or(false);
        let preflight_report = if run_preflight_check {
            Some(run_preflight(&config).await)
        } else {
            None
        };

        let session = self.registry.create(config).await;
        let mut guard = session.lock().await;
        guard.z_notes = parsed.z_notes.unwrap_or_default();
        let session_id = guard.id.clone();
        let config_json = config_to_json(&guard.config);
        drop(guard);

        let mut response = json!({
            "sessionId": session_id,
            "config": config_json,
        });
        if let Some(report) = preflight_report {
            response["preflight"] = preflight_to_json(&report);
        }
        Ok(response)
    }

    async fn handle_submit(&self, args: Value) -> DispatchResult<Value> {
        let parsed: SubmitArgs = serde_json::from_value(args)
            .map_err(|e| TrmError::Validation(format!("invalid submit arguments: {e}")))?;

        let session = self
            .registry
            .get(&parsed.session_id)
            .await
            .ok_or(TrmError::SessionNotFound)?;

        let mut guard = session.lock().await;
        let result = run_evaluation(&mut guard, self.applier.as_ref(), &parsed.candidate)
            .await
            .map_err(|e| TrmError::Validation(e.to_string()))?;

        Ok(eval_result_to_json(&result))
    }

    async fn handle_state(&self, args: Value) -> DispatchResult<Value> {
        let parsed: SessionIdArgs = serde_json::from_value(args)
            .map_err(|e| TrmError::Validation(format!("invalid arguments: {e}")))?;
        let session = self
            .registry
            .get(&parsed.session_id)
            .await
            .ok_or(TrmError::SessionNotFound)?;
        let guard = session.lock().await;

        Ok(json!({
            "sessionId": guard.id,
            "step": guard.step,
            "emaScore": guard.ema_score,
            "bestScore": guard.best_score,
            "noImproveStreak": guard.no_improve_streak,
            "last": guard.last_result().map(eval_result_to_json),
            "zNotes": guard.z_notes,
        }))
    }

    async fn handle_halt(&self, args: Value) -> DispatchResult<Value> {
        let parsed: SessionIdArgs = serde_json::from_value(args)
            .map_err(|e| TrmError::Validation(format!("invalid arguments: {e}")))?;
        let session = self
            .registry
            .get(&parsed.session_id)
            .await
            .ok_or(TrmError::SessionNotFound)?;
        let guard = session.lock().await;

        match guard.last_result() {
            Some(last) => Ok(json!({
                "shouldHalt": last.should_halt,
                "reasons": last.reasons,
            })),
            None => Ok(json!({
                "shouldHalt": false,
                "reasons": ["No evaluations yet"],
            })),
        }
    }

    async fn handle_end(&self, args: Value) -> DispatchResult<Value> {
        let parsed: SessionIdArgs = serde_json::from_value(args)
            .map_err(|e| TrmError::Validation(format!("invalid arguments: {e}")))?;
        let existed = self.registry.delete(&parsed.session_id).await;
        if !existed {
            return Err(TrmError::SessionNotFound);
        }
        Ok(json!({"ok": true, "message": "session ended"}))
    }

    async fn handle_read(&self, args: Value) -> DispatchResult<Value> {
        let parsed: ReadArgs = serde_json::from_value(args)
            .map_err(|e| TrmError::Validation(format!("invalid arguments: {e}")))?;
        let session = self
            .registry
            .get(&parsed.session_id)
            .await
            .ok_or(TrmError::SessionNotFound)?;
        let guard = session.lock().await;
        let repo_path = guard.config.repo_path.clone();
        drop(guard);

        let mut files = serde_json::Map::new();
        for path in &parsed.paths {
            files.insert(path.clone(), read_one_file(&repo_path, path).await);
        }
        Ok(json!({"files": files}))
    }

    /// Argument-validated, semantics-unimplemented handlers for the
    /// checkpoint/suggestion/review surface, matching the source system's
    /// own explicit placeholder status for these operations.
    async fn handle_placeholder(&self, args: Value) -> DispatchResult<Value> {
        if let Some(session_id) = args.get("session_id").and_then(Value::as_str) {
            if !session_id.is_empty() && self.registry.get(session_id).await.is_none() {
                return Err(TrmError::SessionNotFound);
            }
        }
        Ok(json!({"ok": false, "message": "not implemented"}))
    }
}

fn merge_weights(provided: Option<WeightsArgs>, defaults: &WeightsConfig) -> WeightsConfig {
    match provided {
        None => *defaults,
        Some(w) => WeightsConfig {
            data_quality: w.data_quality.unwrap_or(defaults.data_quality),
            test: w.test.unwrap_or(defaults.test),
            lint: w.lint.unwrap_or(defaults.lint),
            perf: w.perf.unwrap_or(defaults.perf),
        },
    }
}

fn config_to_json(config: &SessionConfig) -> Value {
    json!({
        "repoPath": config.repo_path.display().to_string(),
        "dataQualityCmd": config.data_quality_cmd,
        "testCmd": config.test_cmd,
        "lintCmd": config.lint_cmd,
        "perfCmd": config.perf_cmd,
        "timeoutSec": config.timeout_sec,
        "weights": {
            "dataQuality": config.weights.data_quality,
            "test": config.weights.test,
            "lint": config.weights.lint,
            "perf": config.weights.perf,
        },
        "halt": {
            "maxSteps": config.halt.max_steps,
            "passThreshold": config.halt.pass_threshold,
            "patienceNoImprove": config.halt.patience_no_improve,
            "minSteps": config.halt.min_steps,
        },
        "emaAlpha": config.ema_alpha,
    })
}

fn preflight_to_json(report: &PreflightReport) -> Value {
    json!({
        "repoExists": report.repo_exists,
        "commandsAvailable": {
            "dataQuality": report.commands_available.data_quality,
            "test": report.commands_available.test,
            "lint": report.commands_available.lint,
            "perf": report.commands_available.perf,
        },
        "initialBuild": report.initial_build.as_ref().map(|b| json!({
            "success": b.success,
            "output": b.output,
        })),
        "initialTests": report.initial_tests.as_ref().map(|t| json!({
            "success": t.success,
            "passed": t.passed,
            "failed": t.failed,
            "total": t.total,
        })),
    })
}

fn eval_result_to_json(result: &EvalResult) -> Value {
    json!({
        "step": result.step,
        "score": result.score,
        "emaScore": result.ema_score,
        "okDataQuality": result.ok_data_quality,
        "okLint": result.ok_lint,
        "tests": result.tests.map(test_results_to_json),
        "perf": result.perf.map(perf_result_to_json),
        "feedback": result.feedback,
        "shouldHalt": result.should_halt,
        "reasons": result.reasons,
    })
}

fn test_results_to_json(tests: TestResults) -> Value {
    json!({"passed": tests.passed, "failed": tests.failed, "total": tests.total})
}

fn perf_result_to_json(perf: PerfResult) -> Value {
    json!({"value": perf.value, "unit": perf.unit})
}

async fn read_one_file(repo_path: &Path, path: &str) -> Value {
    let resolved = match trm_core::candidate::resolve_under_repo(repo_path, path) {
        Ok(p) => p,
        Err(e) => return json!({"error": e.to_string()}),
    };

    match tokio::fs::read_to_string(&resolved).await {
        Ok(content) => {
            let metadata = tokio::fs::metadata(&resolved).await.ok();
            let size_bytes = metadata.as_ref().map(|m| m.len()).unwrap_or(content.len() as u64);
            let last_modified = metadata
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            json!({
                "content": content,
                "lineCount": content.lines().count(),
                "sizeBytes": size_bytes,
                "lastModified": last_modified,
            })
        }
        Err(e) => json!({"error": e.to_string()}),
    }
}

#[derive(Deserialize)]
struct WeightsArgs {
    data_quality: Option<f64>,
    test: Option<f64>,
    lint: Option<f64>,
    perf: Option<f64>,
}

#[derive(Deserialize)]
struct HaltArgs {
    max_steps: u32,
    pass_threshold: f64,
    patience_no_improve: u32,
    min_steps: Option<u32>,
}

#[derive(Deserialize)]
struct StartArgs {
    repo_path: String,
    data_quality_cmd: Option<String>,
    test_cmd: Option<String>,
    lint_cmd: Option<String>,
    perf_cmd: Option<String>,
    timeout_sec: Option<u64>,
    weights: Option<WeightsArgs>,
    halt: HaltArgs,
    ema_alpha: Option<f64>,
    z_notes: Option<String>,
    preflight: Option<bool>,
}

#[derive(Deserialize)]
struct SubmitArgs {
    session_id: String,
    candidate: Candidate,
    #[allow(dead_code)]
    rationale: Option<String>,
}

#[derive(Deserialize)]
struct SessionIdArgs {
    session_id: String,
}

#[derive(Deserialize)]
struct ReadArgs {
    session_id: String,
    paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> DefaultsConfig {
        DefaultsConfig {
            timeout_sec: 30,
            ema_alpha: 0.9,
            weights: WeightsConfig::default(),
            halt: HaltConfig::default(),
        }
    }

    #[tokio::test]
    async fn start_then_state_reflects_fresh_session() {
        let dispatcher = Dispatcher::new(defaults());
        let tmp = tempfile::tempdir().unwrap();
        let start = dispatcher
            .dispatch(
                "start",
                json!({"repo": tmp.path().display().to_string(), "halt": {"max": 5, "threshold": 0.9, "patience": 2}}),
            )
            .await;
        assert_eq!(start["ok"], true);
        let session_id = start["result"]["sessionId"].as_str().unwrap().to_string();

        let state = dispatcher.dispatch("state", json!({"sid": session_id})).await;
        assert_eq!(state["ok"], true);
        assert_eq!(state["result"]["step"], 0);
        assert_eq!(state["result"]["emaScore"], 0.0);
        assert_eq!(state["result"]["bestScore"], 0.0);
        assert!(state["result"]["last"].is_null());
    }

    #[tokio::test]
    async fn submit_unknown_session_returns_error() {
        let dispatcher = Dispatcher::new(defaults());
        let response = dispatcher
            .dispatch(
                "submit",
                json!({"sid": "does-not-exist", "candidate": {"mode": "files", "files": []}}),
            )
            .await;
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"], "Session not found");
    }

    #[tokio::test]
    async fn end_then_any_op_yields_lookup_miss() {
        let dispatcher = Dispatcher::new(defaults());
        let tmp = tempfile::tempdir().unwrap();
        let start = dispatcher
            .dispatch(
                "start",
                json!({"repo": tmp.path().display().to_string(), "halt": {"max": 5, "threshold": 0.9, "patience": 2}}),
            )
            .await;
        let session_id = start["result"]["sessionId"].as_str().unwrap().to_string();

        let end = dispatcher.dispatch("end", json!({"sid": session_id})).await;
        assert_eq!(end["ok"], true);

        let state = dispatcher.dispatch("state", json!({"sid": session_id})).await;
        assert_eq!(state["ok"], false);
    }

    #[tokio::test]
    async fn halt_before_any_submit_reports_no_evaluations() {
        let dispatcher = Dispatcher::new(defaults());
        let tmp = tempfile::tempdir().unwrap();
        let start = dispatcher
            .dispatch(
                "start",
                json!({"repo": tmp.path().display().to_string(), "halt": {"max": 5, "threshold": 0.9, "patience": 2}}),
            )
            .await;
        let session_id = start["result"]["sessionId"].as_str().unwrap().to_string();

        let halt = dispatcher.dispatch("halt", json!({"sid": session_id})).await;
        assert_eq!(halt["result"]["shouldHalt"], false);
        assert_eq!(halt["result"]["reasons"][0], "No evaluations yet");
    }

    #[tokio::test]
    async fn placeholder_operations_report_not_implemented() {
        let dispatcher = Dispatcher::new(defaults());
        for op in ["validate", "suggest", "reset", "undo", "fix", "checkpointList"] {
            let response = dispatcher.dispatch(op, json!({})).await;
            assert_eq!(response["ok"], true, "op {op}");
            assert_eq!(response["result"]["message"], "not implemented", "op {op}");
        }
    }

    #[tokio::test]
    async fn unsupported_operation_is_a_validation_error() {
        let dispatcher = Dispatcher::new(defaults());
        let response = dispatcher.dispatch("nonexistent-op", json!({})).await;
        assert_eq!(response["ok"], false);
    }

    #[tokio::test]
    async fn read_reports_per_path_errors_without_failing_other_paths() {
        let dispatcher = Dispatcher::new(defaults());
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("exists.txt"), "hello\nworld\n").unwrap();

        let start = dispatcher
            .dispatch(
                "start",
                json!({"repo": tmp.path().display().to_string(), "halt": {"max": 5, "threshold": 0.9, "patience": 2}}),
            )
            .await;
        let session_id = start["result"]["sessionId"].as_str().unwrap().to_string();

        let read = dispatcher
            .dispatch("read", json!({"sid": session_id, "paths": ["exists.txt", "missing.txt"]}))
            .await;
        assert_eq!(read["ok"], true);
        assert_eq!(read["result"]["files"]["exists.txt"]["lineCount"], 2);
        assert!(read["result"]["files"]["missing.txt"]["error"].is_string());
    }
}
