//! Persisted conversation log (`<config-dir>/chat.json`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::config::write_atomic;
use crate::core::types::History;

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted log. Missing or corrupt files yield an empty history.
    pub fn load(&self) -> History {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return History::default(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not read chat history, starting fresh");
                return History::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(history) => history,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not parse chat history, starting fresh");
                History::default()
            }
        }
    }

    /// Persist the whole log (best effort).
    ///
    /// Failures are logged and reported through the return value, never raised.
    pub fn save(&self, history: &History) -> bool {
        match self.write(history) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %self.path.display(), err = %format!("{err:#}"), "error saving chat history");
                false
            }
        }
    }

    fn write(&self, history: &History) -> Result<()> {
        debug!(path = %self.path.display(), turns = history.len(), "writing chat history");
        let mut buf = serde_json::to_string_pretty(history).context("serialize chat history")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    /// Delete the persisted log. A missing log is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ConversationTurn, Role};

    #[test]
    fn save_then_load_preserves_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(temp.path().join("chat.json"));
        let mut history = store.load();
        history.append(ConversationTurn::user("goal"));
        history.append(ConversationTurn::assistant("first"));
        history.append(ConversationTurn::assistant("second"));

        assert!(store.save(&history));
        let loaded = store.load();
        let roles: Vec<Role> = loaded.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
        assert_eq!(loaded, history);
    }

    #[test]
    fn corrupt_history_loads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("chat.json");
        fs::write(&path, "[{\"role\": \"robot\"}]").expect("write");
        assert!(HistoryStore::new(path).load().is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(temp.path().join("chat.json"));
        store.clear().expect("clear missing");

        assert!(store.save(&History::new(vec![ConversationTurn::user("x")])));
        store.clear().expect("clear");
        assert!(!temp.path().join("chat.json").exists());
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_reports_failure_without_raising() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").expect("write");
        let store = HistoryStore::new(blocker.join("chat.json"));
        assert!(!store.save(&History::default()));
    }
}
