use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single file's full content, as submitted in `files` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

/// A single unified-diff hunk against one path, as submitted in `diff` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub path: String,
    pub diff: String,
}

/// A proposed edit to the repository, as one of three disjoint shapes.
/// Unknown `mode` values are rejected at deserialization (schema) time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Candidate {
    Diff { changes: Vec<ChangeEntry> },
    Patch { patch: String },
    Files { files: Vec<FileEntry> },
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("diff mode is not implemented")]
    DiffNotImplemented,

    #[error("patch mode is not implemented")]
    PatchNotImplemented,

    #[error("path '{0}' escapes the repository root")]
    PathEscapesRepo(String),

    #[error("io error writing '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Outcome of applying a candidate: the set of paths that were modified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub modified_paths: Vec<String>,
}

/// External collaborator that turns a `Candidate` into filesystem changes.
/// The evaluation pipeline depends only on this trait, never on a concrete
/// patcher, so a test double can stand in during pipeline tests.
#[async_trait]
pub trait CandidateApplier: Send + Sync {
    async fn apply(&self, repo_path: &Path, candidate: &Candidate) -> Result<ApplyOutcome, ApplyError>;
}

/// Resolve `path` under `repo_path`, rejecting any path that would escape it.
pub fn resolve_under_repo(repo_path: &Path, path: &str) -> Result<PathBuf, ApplyError> {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(ApplyError::PathEscapesRepo(path.to_string()));
    }

    let joined = repo_path.join(candidate);
    let mut depth: i64 = 0;
    for component in candidate.components() {
        match component {
            std::path::Component::ParentDir => depth -= 1,
            std::path::Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return Err(ApplyError::PathEscapesRepo(path.to_string()));
        }
    }

    Ok(joined)
}

/// The only applier this crate implements fully: writes whole-file content
/// for `files`-mode candidates. `diff`/`patch` are accepted by the schema
/// (so malformed candidates are still rejected early) but rejected here —
/// unified-diff/patch parsing is an external collaborator's job.
pub struct FilesApplier;

#[async_trait]
impl CandidateApplier for FilesApplier {
    async fn apply(&self, repo_path: &Path, candidate: &Candidate) -> Result<ApplyOutcome, ApplyError> {
        let files = match candidate {
            Candidate::Files { files } => files,
            Candidate::Diff { .. } => return Err(ApplyError::DiffNotImplemented),
            Candidate::Patch { .. } => return Err(ApplyError::PatchNotImplemented),
        };

        let mut modified_paths = Vec::with_capacity(files.len());
        for entry in files {
            let resolved = resolve_under_repo(repo_path, &entry.path)?;
            if let Some(parent) = resolved.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ApplyError::Io {
                        path: entry.path.clone(),
                        source: e,
                    })?;
            }
            tokio::fs::write(&resolved, &entry.content)
                .await
                .map_err(|e| ApplyError::Io {
                    path: entry.path.clone(),
                    source: e,
                })?;
            modified_paths.push(resolved.display().to_string());
        }

        Ok(ApplyOutcome { modified_paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn files_mode_writes_content() {
        let tmp = tempfile::tempdir().unwrap();
        let candidate = Candidate::Files {
            files: vec![FileEntry {
                path: "src/lib.rs".to_string(),
                content: "fn main() {}".to_string(),
            }],
        };

        let outcome = FilesApplier.apply(tmp.path(), &candidate).await.unwrap();
        assert_eq!(outcome.modified_paths.len(), 1);
        let written = std::fs::read_to_string(tmp.path().join("src/lib.rs")).unwrap();
        assert_eq!(written, "fn main() {}");
    }

    #[tokio::test]
    async fn files_mode_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let candidate = Candidate::Files {
            files: vec![FileEntry {
                path: "a.txt".to_string(),
                content: "hello".to_string(),
            }],
        };

        let first = FilesApplier.apply(tmp.path(), &candidate).await.unwrap();
        let second = FilesApplier.apply(tmp.path(), &candidate).await.unwrap();
        assert_eq!(first.modified_paths, second.modified_paths);
    }

    #[tokio::test]
    async fn diff_mode_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let candidate = Candidate::Diff { changes: vec![] };
        let err = FilesApplier.apply(tmp.path(), &candidate).await.unwrap_err();
        assert!(matches!(err, ApplyError::DiffNotImplemented));
    }

    #[tokio::test]
    async fn patch_mode_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let candidate = Candidate::Patch { patch: "".to_string() };
        let err = FilesApplier.apply(tmp.path(), &candidate).await.unwrap_err();
        assert!(matches!(err, ApplyError::PatchNotImplemented));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let repo = Path::new("/tmp/repo");
        let err = resolve_under_repo(repo, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, ApplyError::PathEscapesRepo(_)));
    }

    #[test]
    fn absolute_path_is_rejected() {
        let repo = Path::new("/tmp/repo");
        let err = resolve_under_repo(repo, "/etc/passwd").unwrap_err();
        assert!(matches!(err, ApplyError::PathEscapesRepo(_)));
    }

    #[test]
    fn normal_relative_path_resolves() {
        let repo = Path::new("/tmp/repo");
        let resolved = resolve_under_repo(repo, "src/main.rs").unwrap();
        assert_eq!(resolved, Path::new("/tmp/repo/src/main.rs"));
    }

    #[test]
    fn candidate_tagged_union_roundtrip() {
        let json = r#"{"mode":"files","files":[{"path":"a.py","content":"x=1"}]}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert!(matches!(candidate, Candidate::Files { .. }));
    }
}
