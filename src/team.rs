use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::config::TeamSettings;
use crate::error::{CrewError, Result};

/// How many agents a project warrants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSize {
    Small,
    Medium,
    Large,
}

impl fmt::Display for TeamSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamSize::Small => "small",
            TeamSize::Medium => "medium",
            TeamSize::Large => "large",
        };
        f.write_str(s)
    }
}

/// Result of scanning a project tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub source_files: usize,
    pub size: TeamSize,
}

/// Count files under `root` whose extension is one of `extensions`.
///
/// Honors `.gitignore` files whether or not `root` is a git checkout, and
/// skips hidden entries.
pub fn count_source_files(root: &Path, extensions: &[String]) -> Result<usize> {
    if !root.is_dir() {
        return Err(CrewError::InvalidPath {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .build();

    let count = walker
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .count();

    Ok(count)
}

pub fn classify(source_files: usize, settings: &TeamSettings) -> TeamSize {
    if source_files < settings.small_below {
        TeamSize::Small
    } else if source_files < settings.medium_below {
        TeamSize::Medium
    } else {
        TeamSize::Large
    }
}

pub fn detect(root: &Path, settings: &TeamSettings) -> Result<Detection> {
    let source_files = count_source_files(root, &settings.source_extensions)?;
    let size = classify(source_files, settings);
    tracing::debug!(root = %root.display(), source_files, %size, "detected team size");
    Ok(Detection { source_files, size })
}

/// Window names for a list of roles; repeats get a numeric suffix.
///
/// `["developer", "developer"]` becomes `["developer", "developer-2"]`.
pub fn window_names(roles: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    roles
        .iter()
        .map(|role| {
            let n = seen.entry(role.as_str()).or_insert(0);
            *n += 1;
            if *n == 1 {
                role.clone()
            } else {
                format!("{}-{}", role, n)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_classify_thresholds() {
        let settings = TeamSettings::default();
        assert_eq!(classify(0, &settings), TeamSize::Small);
        assert_eq!(classify(49, &settings), TeamSize::Small);
        assert_eq!(classify(50, &settings), TeamSize::Medium);
        assert_eq!(classify(199, &settings), TeamSize::Medium);
        assert_eq!(classify(200, &settings), TeamSize::Large);
    }

    #[test]
    fn test_counts_only_source_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "src/lib.RS");
        touch(dir.path(), "web/app.ts");
        touch(dir.path(), "README.md");
        touch(dir.path(), "Makefile");

        let settings = TeamSettings::default();
        assert_eq!(count_source_files(dir.path(), &settings.source_extensions).unwrap(), 3);
    }

    #[test]
    fn test_respects_gitignore_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "target/debug/build.rs");
        touch(dir.path(), ".cache/gen.rs");

        let settings = TeamSettings::default();
        assert_eq!(count_source_files(dir.path(), &settings.source_extensions).unwrap(), 1);
    }

    #[test]
    fn test_detect_rejects_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = detect(&dir.path().join("missing"), &TeamSettings::default()).unwrap_err();
        assert!(matches!(err, CrewError::InvalidPath { .. }));
    }

    #[test]
    fn test_window_names_number_duplicates() {
        let roles: Vec<String> = ["pm", "developer", "developer", "qa", "developer"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            window_names(&roles),
            vec!["pm", "developer", "developer-2", "qa", "developer-3"]
        );
    }
}
