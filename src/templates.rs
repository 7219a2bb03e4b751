//! Role templates: markdown briefings sent verbatim to a freshly started agent.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CrewError, Result};

static BUILTIN: &[(&str, &str)] = &[
    ("project-manager", include_str!("../templates/project-manager.md")),
    ("developer", include_str!("../templates/developer.md")),
    ("qa", include_str!("../templates/qa.md")),
    ("devops", include_str!("../templates/devops.md")),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::File(path) => write!(f, "{}", path.display()),
            TemplateSource::BuiltIn => f.write_str("built-in"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoleTemplate {
    pub role: String,
    pub text: String,
    pub source: TemplateSource,
}

/// Strip a trailing `-<n>` window suffix: `developer-2` -> `developer`.
pub fn base_role(role: &str) -> &str {
    match role.rsplit_once('-') {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => base,
        _ => role,
    }
}

pub fn builtin(role: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, text)| *text)
}

/// Resolve the template for `role`, preferring `<dir>/<role>.md`.
pub fn load(role: &str, dir: &Path) -> Result<RoleTemplate> {
    let base = base_role(role);
    let path = dir.join(format!("{}.md", base));

    if path.is_file() {
        let text = std::fs::read_to_string(&path)?;
        tracing::debug!(role = base, path = %path.display(), "using template file");
        return Ok(RoleTemplate {
            role: base.to_string(),
            text,
            source: TemplateSource::File(path),
        });
    }

    builtin(base)
        .map(|text| RoleTemplate {
            role: base.to_string(),
            text: text.to_string(),
            source: TemplateSource::BuiltIn,
        })
        .ok_or_else(|| CrewError::TemplateNotFound(base.to_string()))
}

/// Every known role and where its template comes from. Files shadow built-ins.
pub fn available(dir: &Path) -> Result<BTreeMap<String, TemplateSource>> {
    let mut roles: BTreeMap<String, TemplateSource> = BUILTIN
        .iter()
        .map(|(name, _)| (name.to_string(), TemplateSource::BuiltIn))
        .collect();

    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                roles.insert(stem.to_string(), TemplateSource::File(path.clone()));
            }
        }
    }

    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_role() {
        assert_eq!(base_role("developer-2"), "developer");
        assert_eq!(base_role("project-manager"), "project-manager");
        assert_eq!(base_role("qa"), "qa");
        assert_eq!(base_role("-3"), "-3");
        assert_eq!(base_role("dev-"), "dev-");
    }

    #[test]
    fn test_builtin_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let template = load("developer-3", dir.path()).unwrap();
        assert_eq!(template.role, "developer");
        assert_eq!(template.source, TemplateSource::BuiltIn);
        assert!(template.text.starts_with("# Role: Developer"));
    }

    #[test]
    fn test_file_overrides_builtin_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let text = "# Custom QA\n\nExact   spacing\n";
        std::fs::write(dir.path().join("qa.md"), text).unwrap();

        let template = load("qa", dir.path()).unwrap();
        assert_eq!(template.text, text);
        assert!(matches!(template.source, TemplateSource::File(_)));
    }

    #[test]
    fn test_unknown_role() {
        let dir = tempfile::tempdir().unwrap();
        let err = load("astronaut", dir.path()).unwrap_err();
        assert!(matches!(err, CrewError::TemplateNotFound(ref r) if r == "astronaut"));
    }

    #[test]
    fn test_available_merges_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("designer.md"), "# Designer").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let roles = available(dir.path()).unwrap();
        assert!(roles.contains_key("designer"));
        assert!(roles.contains_key("developer"));
        assert!(!roles.contains_key("notes"));
    }
}
