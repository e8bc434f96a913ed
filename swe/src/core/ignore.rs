//! Ignore-pattern matching for context ingestion.
//!
//! Pattern forms (first match wins, no negation):
//! - `dir/` matches any path containing `dir` as a run of whole components.
//! - `*suffix` matches any path ending with `suffix`.
//! - anything else matches when it occurs as a substring of the path.

use std::path::{Component, Path, PathBuf};

/// Patterns used when no ignore file exists.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git/",
    "__pycache__/",
    "*.pyc",
    ".DS_Store",
    "node_modules/",
    "venv/",
    ".env/",
    ".idea/",
    ".vscode/",
    "dist/",
    ".gitignore",
    "poetry.lock",
    ".pytest_cache/",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Dir(Vec<String>),
    Suffix(String),
    Substring(String),
}

impl Pattern {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return None;
        }
        if let Some(dir) = raw.strip_suffix('/') {
            let parts: Vec<String> = dir
                .split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
            if parts.is_empty() {
                return None;
            }
            return Some(Self::Dir(parts));
        }
        if let Some(suffix) = raw.strip_prefix('*') {
            return Some(Self::Suffix(suffix.to_string()));
        }
        Some(Self::Substring(raw.to_string()))
    }

    fn matches(&self, normalized: &str) -> bool {
        match self {
            Self::Dir(parts) => {
                let components: Vec<&str> = normalized.split('/').collect();
                components
                    .windows(parts.len())
                    .any(|window| window.iter().zip(parts).all(|(a, b)| *a == b.as_str()))
            }
            Self::Suffix(suffix) => normalized.ends_with(suffix.as_str()),
            Self::Substring(needle) => normalized.contains(needle.as_str()),
        }
    }
}

/// Compiled set of ignore patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::from_patterns(DEFAULT_IGNORES.iter().copied())
    }
}

impl IgnoreRules {
    /// Parse newline-delimited patterns. Blank lines and `#` comments are skipped.
    pub fn parse(contents: &str) -> Self {
        Self::from_patterns(contents.lines())
    }

    pub fn from_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            patterns: patterns.into_iter().filter_map(Pattern::parse).collect(),
        }
    }

    /// Returns true if `path` is matched by any pattern.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        self.patterns.iter().any(|p| p.matches(&normalized))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Render the default ignore file contents.
pub fn default_ignore_file() -> String {
    let mut buf = String::from("# Paths skipped when adding directories to the context.\n");
    for pattern in DEFAULT_IGNORES {
        buf.push_str(pattern);
        buf.push('\n');
    }
    buf
}

/// Lexically normalize a path into `/`-separated form without `.` components.
pub fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => parts.push("..".to_string()),
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().into_owned());
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` directly below the root stays at the root. Leading `..` of a
/// relative path is kept.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(patterns: &[&str]) -> IgnoreRules {
        IgnoreRules::from_patterns(patterns.iter().copied())
    }

    #[test]
    fn star_pattern_matches_suffix() {
        let rules = rules(&["*.pyc"]);
        assert!(rules.is_ignored(Path::new("pkg/x.pyc")));
        assert!(rules.is_ignored(Path::new("/abs/y.pyc")));
        assert!(!rules.is_ignored(Path::new("pkg/x.py")));
    }

    #[test]
    fn dir_pattern_matches_whole_components() {
        let rules = rules(&["node_modules/"]);
        assert!(rules.is_ignored(Path::new("node_modules")));
        assert!(rules.is_ignored(Path::new("web/node_modules/react/index.js")));
        assert!(!rules.is_ignored(Path::new("web/node_modules2/index.js")));
        assert!(!rules.is_ignored(Path::new("web/my_node_modules/index.js")));
    }

    #[test]
    fn nested_dir_pattern_requires_consecutive_components() {
        let rules = rules(&["build/out/"]);
        assert!(rules.is_ignored(Path::new("a/build/out/x.o")));
        assert!(!rules.is_ignored(Path::new("a/build/x/out/x.o")));
    }

    #[test]
    fn plain_pattern_matches_substring() {
        let rules = rules(&["poetry.lock"]);
        assert!(rules.is_ignored(Path::new("proj/poetry.lock")));
        assert!(!rules.is_ignored(Path::new("proj/Cargo.lock")));
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let rules = IgnoreRules::parse("# comment\n\n*.log\n  target/  \n");
        assert_eq!(rules.len(), 2);
        assert!(rules.is_ignored(Path::new("a.log")));
        assert!(rules.is_ignored(Path::new("target/debug/swe")));
        assert!(!rules.is_ignored(Path::new("# comment")));
    }

    #[test]
    fn default_file_round_trips_to_default_rules() {
        assert_eq!(IgnoreRules::parse(&default_ignore_file()), IgnoreRules::default());
    }

    #[test]
    fn normalize_drops_current_dir_components() {
        assert_eq!(normalize(Path::new("./src/./main.rs")), "src/main.rs");
        assert_eq!(normalize(Path::new("/tmp/x")), "/tmp/x");
    }

    #[test]
    fn lexical_clean_folds_parent_and_current_dirs() {
        assert_eq!(
            lexical_clean(Path::new("/p/sub/../a.py")),
            PathBuf::from("/p/a.py")
        );
        assert_eq!(
            lexical_clean(Path::new("/p/./src/./b.rs")),
            PathBuf::from("/p/src/b.rs")
        );
        assert_eq!(lexical_clean(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(lexical_clean(Path::new("../x/../y")), PathBuf::from("../y"));
    }
}
