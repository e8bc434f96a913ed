//! Shared deterministic types for the pipeline core.
//!
//! These types define the contracts between stores, the generation service
//! and the implementation engine. They hold no I/O handles.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Value of `next_file` (or `file`) that ends the edit chain.
pub const SENTINEL: &str = "none";

/// Returns true for the termination sentinel: empty, or `none` in any case.
pub fn is_sentinel(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(SENTINEL)
}

/// Ordered set of absolute file paths shown to the generation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSet {
    #[serde(default)]
    context: Vec<PathBuf>,
}

impl ContextSet {
    pub fn paths(&self) -> &[PathBuf] {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.context.iter().any(|p| p == path)
    }

    /// Add `path` unless already present. Returns true if it was added.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.contains(&path) {
            return false;
        }
        self.context.push(path);
        true
    }

    /// Remove an exact member. Returns true if it was present.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.context.len();
        self.context.retain(|p| p != path);
        before != self.context.len()
    }

    /// Remove every member located at or below `prefix` (component-wise).
    pub fn remove_under(&mut self, prefix: &Path) -> usize {
        let before = self.context.len();
        self.context.retain(|p| !p.starts_with(prefix));
        before - self.context.len()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.context.len();
        self.context.clear();
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only conversation log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    pub fn new(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render as `Role: content` lines, the form handed to the generation service.
    pub fn format(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Structured single-file edit produced by one Generate step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditInstruction {
    /// Path of the file to write (relative paths resolve against the project root).
    pub file: String,
    /// Complete new content for `file`.
    pub content: String,
    /// Next file to edit, or the sentinel `none`.
    #[serde(alias = "next_file_to_implement")]
    pub next_file: String,
}

impl EditInstruction {
    pub fn new(
        file: impl Into<String>,
        content: impl Into<String>,
        next_file: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            content: content.into(),
            next_file: next_file.into(),
        }
    }

    /// Target path, or `None` when the target is the termination sentinel.
    pub fn target(&self) -> Option<&str> {
        (!is_sentinel(&self.file)).then(|| self.file.trim())
    }

    /// Whether the instruction asks for another iteration.
    pub fn wants_next(&self) -> bool {
        !is_sentinel(&self.next_file)
    }
}

/// Result of one structured generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Parsed(EditInstruction),
    /// The service answered, but not with a usable edit instruction.
    Malformed(String),
}

impl GenerationResult {
    /// Text recorded in History for this generation.
    pub fn transcript(&self) -> String {
        match self {
            Self::Parsed(instruction) => {
                serde_json::to_string(instruction).unwrap_or_else(|_| format!("{instruction:?}"))
            }
            Self::Malformed(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for EditInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file={} next_file={} ({} bytes)",
            self.file,
            self.next_file,
            self.content.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_case_insensitive_and_covers_empty() {
        assert!(is_sentinel("none"));
        assert!(is_sentinel("None"));
        assert!(is_sentinel(" NONE "));
        assert!(is_sentinel(""));
        assert!(!is_sentinel("src/none.rs"));
    }

    #[test]
    fn context_set_insert_is_idempotent() {
        let mut set = ContextSet::default();
        for _ in 0..5 {
            set.insert(PathBuf::from("/p/a.py"));
        }
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_under_is_component_aware() {
        let mut set = ContextSet::default();
        set.insert(PathBuf::from("/p/src/a.rs"));
        set.insert(PathBuf::from("/p/src/nested/b.rs"));
        set.insert(PathBuf::from("/p/srcs/c.rs"));

        assert_eq!(set.remove_under(Path::new("/p/src")), 2);
        assert_eq!(set.paths(), &[PathBuf::from("/p/srcs/c.rs")]);
    }

    #[test]
    fn context_set_serializes_under_context_key() {
        let mut set = ContextSet::default();
        set.insert(PathBuf::from("/p/a.py"));
        let json = serde_json::to_string(&set).expect("serialize");
        assert_eq!(json, r#"{"context":["/p/a.py"]}"#);
    }

    #[test]
    fn history_formats_role_prefixed_lines() {
        let mut history = History::default();
        history.append(ConversationTurn::user("add a function"));
        history.append(ConversationTurn::assistant("done"));
        assert_eq!(history.format(), "User: add a function\nAssistant: done");
    }

    #[test]
    fn history_persists_as_plain_list() {
        let history = History::new(vec![ConversationTurn::user("hi")]);
        let json = serde_json::to_string(&history).expect("serialize");
        assert_eq!(json, r#"[{"role":"user","content":"hi"}]"#);
    }

    #[test]
    fn instruction_accepts_long_next_field_name() {
        let parsed: EditInstruction = serde_json::from_str(
            r#"{"file":"a.py","content":"x","next_file_to_implement":"None"}"#,
        )
        .expect("parse");
        assert_eq!(parsed.next_file, "None");
        assert!(!parsed.wants_next());
    }

    #[test]
    fn sentinel_target_has_no_path() {
        let instruction = EditInstruction::new("None", "x", "none");
        assert_eq!(instruction.target(), None);
        let instruction = EditInstruction::new(" a.py ", "x", "b.py");
        assert_eq!(instruction.target(), Some("a.py"));
        assert!(instruction.wants_next());
    }
}
