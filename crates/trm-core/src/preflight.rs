use serde::{Deserialize, Serialize};

use crate::parsers::parse_test_output;
use crate::session::SessionConfig;
use crate::subprocess;

const PREFLIGHT_OUTPUT_TRUNCATE: usize = 500;

/// Availability of each configured probe's underlying command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsAvailable {
    pub data_quality: Option<bool>,
    pub test: Option<bool>,
    pub lint: Option<bool>,
    pub perf: Option<bool>,
}

/// Result of running the data-quality probe once during preflight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialBuild {
    pub success: bool,
    pub output: String,
}

/// Result of running and parsing the test probe once during preflight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialTests {
    pub success: bool,
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
}

/// Structured, all-non-fatal validation of a session's environment before
/// its first `submit`. Never mutates session iteration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub repo_exists: bool,
    pub commands_available: CommandsAvailable,
    pub initial_build: Option<InitialBuild>,
    pub initial_tests: Option<InitialTests>,
}

pub async fn run_preflight(config: &SessionConfig) -> PreflightReport {
    let repo_exists = config.repo_path.is_dir();
    if !repo_exists {
        return PreflightReport {
            repo_exists: false,
            commands_available: CommandsAvailable::default(),
            initial_build: None,
            initial_tests: None,
        };
    }

    let commands_available = CommandsAvailable {
        data_quality: check_configured(&config.data_quality_cmd).await,
        test: check_configured(&config.test_cmd).await,
        lint: check_configured(&config.lint_cmd).await,
        perf: check_configured(&config.perf_cmd).await,
    };

    let initial_build = match &config.data_quality_cmd {
        Some(cmd) => {
            let result = subprocess::run(cmd, &config.repo_path, config.timeout_sec, None).await;
            let output = if result.ok { &result.stdout } else { &result.stderr };
            Some(InitialBuild {
                success: result.ok,
                output: truncate(output, PREFLIGHT_OUTPUT_TRUNCATE),
            })
        }
        None => None,
    };

    let initial_tests = match &config.test_cmd {
        Some(cmd) => {
            let result = subprocess::run(cmd, &config.repo_path, config.timeout_sec, None).await;
            let combined = format!("{}\n{}", result.stdout, result.stderr);
            match parse_test_output(&combined, "pytest") {
                Some(t) => Some(InitialTests {
                    success: result.ok && t.failed == 0,
                    passed: t.passed,
                    failed: t.failed,
                    total: t.total,
                }),
                None => Some(InitialTests {
                    success: false,
                    passed: 0,
                    failed: 0,
                    total: 0,
                }),
            }
        }
        None => None,
    };

    PreflightReport {
        repo_exists,
        commands_available,
        initial_build,
        initial_tests,
    }
}

async fn check_configured(cmd: &Option<String>) -> Option<bool> {
    match cmd {
        Some(cmd) => Some(subprocess::check_available(cmd).await),
        None => None,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = s.char_indices().nth(max).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..cut])
    }
}
