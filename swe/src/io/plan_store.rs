//! Plan artifact (`<config-dir>/planner.txt`), kept for user inspection.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::config::write_atomic;

#[derive(Debug, Clone)]
pub struct PlanStore {
    path: PathBuf,
}

impl PlanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replace the stored plan.
    pub fn write(&self, plan: &str) -> Result<()> {
        write_atomic(&self.path, plan)
    }

    /// Read the stored plan; empty when none was written yet.
    pub fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(plan) => Ok(plan),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err).with_context(|| format!("read {}", self.path.display())),
        }
    }

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

    #[test]
    fn write_overwrites_previous_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = PlanStore::new(temp.path().join("planner.txt"));
        assert_eq!(store.read().expect("read empty"), "");

        store.write("1. edit a.py").expect("write");
        store.write("1. edit b.py").expect("rewrite");
        assert_eq!(store.read().expect("read"), "1. edit b.py");

        store.clear().expect("clear");
        store.clear().expect("clear again");
        assert_eq!(store.read().expect("read cleared"), "");
    }
}
