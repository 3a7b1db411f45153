use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::evaluation::EvalResult;
use crate::scoring::{HaltConfig, WeightsConfig};

/// Whether a candidate's modifications accumulate across iterations
/// (`Cumulative`) or each iteration starts from the unmodified repo
/// (`Snapshot`). Most sessions run cumulative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Cumulative,
    Snapshot,
}

/// Immutable-after-creation configuration for one refinement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub repo_path: PathBuf,
    pub data_quality_cmd: Option<String>,
    pub test_cmd: Option<String>,
    pub lint_cmd: Option<String>,
    pub perf_cmd: Option<String>,
    pub timeout_sec: u64,
    pub weights: WeightsConfig,
    pub halt: HaltConfig,
    pub ema_alpha: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            repo_path: PathBuf::new(),
            data_quality_cmd: None,
            test_cmd: None,
            lint_cmd: None,
            perf_cmd: None,
            timeout_sec: 120,
            weights: WeightsConfig::default(),
            halt: HaltConfig::default(),
            ema_alpha: 0.9,
        }
    }
}

/// The stateful container holding configuration and iteration history for
/// one refinement loop. `config` is never mutated after construction; the
/// remaining fields are updated once per completed evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub config: SessionConfig,
    pub created_at: DateTime<Utc>,
    pub step: u32,
    pub best_score: f64,
    pub ema_score: f64,
    pub no_improve_streak: u32,
    pub best_perf: Option<f64>,
    pub history: Vec<EvalResult>,
    pub z_notes: String,
    pub mode: SessionMode,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            id: Uuid::new_v4().to_string(),
            config,
            // The reference implementation this was modeled on stores 0
            // unconditionally here; that's a known bug (see DESIGN.md).
            // A correct session records its actual creation time.
            created_at: Utc::now(),
            step: 0,
            best_score: 0.0,
            ema_score: 0.0,
            no_improve_streak: 0,
            best_perf: None,
            history: Vec::new(),
            z_notes: String::new(),
            mode: SessionMode::default(),
        }
    }

    pub fn last_result(&self) -> Option<&EvalResult> {
        self.history.last()
    }
}

/// Process-wide, concurrency-safe store of live sessions keyed by id.
///
/// Each session is wrapped in its own `Mutex`, so mutating operations on
/// different sessions proceed in parallel while mutating operations on
/// the *same* session are serialized — at most one evaluation pipeline
/// runs per session at any instant, matching the per-session exclusion
/// the engine requires.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, config: SessionConfig) -> Arc<Mutex<Session>> {
        let session = Arc::new(Mutex::new(Session::new(config)));
        let id = session.lock().await.id.clone();
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn list(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
