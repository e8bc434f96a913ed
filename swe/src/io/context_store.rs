//! Persisted context set (`<config-dir>/context.json`).
//!
//! Every operation reads the whole list, mutates it and writes it back. The
//! store assumes a single active process per configuration directory.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use super::config::write_atomic;
use crate::core::ignore::{IgnoreRules, lexical_clean};
use crate::core::types::ContextSet;

/// Load ignore rules from the user-editable pattern file.
///
/// Falls back to the built-in defaults when the file is missing or unreadable.
pub fn load_ignore_rules(path: &Path) -> IgnoreRules {
    match fs::read_to_string(path) {
        Ok(contents) => IgnoreRules::parse(&contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => IgnoreRules::default(),
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read ignore file, using defaults");
            IgnoreRules::default()
        }
    }
}

/// Returns true if the first `probe_bytes` of `path` decode as UTF-8 text.
///
/// A multi-byte character cut off by the probe boundary still counts as text.
pub fn is_readable_text(path: &Path, probe_bytes: usize) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut buf = Vec::with_capacity(probe_bytes);
    if file.take(probe_bytes as u64).read_to_end(&mut buf).is_err() {
        return false;
    }
    match std::str::from_utf8(&buf) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none() && buf.len() == probe_bytes,
    }
}

/// Render `path` relative to `root` when it lives below it, else absolute.
pub fn display_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative.display().to_string(),
        _ => path.display().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
    rules: IgnoreRules,
    probe_bytes: usize,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>, rules: IgnoreRules, probe_bytes: usize) -> Self {
        Self {
            path: path.into(),
            rules,
            probe_bytes,
        }
    }

    /// Load the persisted set. Missing or corrupt files yield an empty set.
    pub fn load(&self) -> ContextSet {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return ContextSet::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not read context list, starting empty");
                return ContextSet::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(set) => set,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "corrupt context list, starting empty");
                ContextSet::default()
            }
        }
    }

    fn save(&self, set: &ContextSet) -> Result<()> {
        debug!(path = %self.path.display(), files = set.len(), "writing context list");
        let mut buf = serde_json::to_string_pretty(set).context("serialize context list")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    pub fn list(&self) -> Vec<PathBuf> {
        self.load().paths().to_vec()
    }

    /// Add a file, or every eligible file below a directory.
    ///
    /// Files matched by an ignore pattern or not readable as text are skipped,
    /// and ignored directories are pruned without descending. Returns the
    /// number of newly added files.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn ingest(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(anyhow!("path {} does not exist", path.display()));
        }
        let mut set = self.load();
        let added = if path.is_dir() {
            self.ingest_dir(&mut set, path)?
        } else if self.rules.is_ignored(path) {
            debug!("file matches ignore pattern");
            0
        } else {
            usize::from(self.add_if_readable(&mut set, path)?)
        };
        if added > 0 {
            self.save(&set)?;
        }
        info!(added, total = set.len(), "ingested");
        Ok(added)
    }

    fn ingest_dir(&self, set: &mut ContextSet, root: &Path) -> Result<usize> {
        if self.rules.is_ignored(root) {
            debug!("directory matches ignore pattern");
            return Ok(0);
        }
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !self.rules.is_ignored(relative_to(entry.path(), root))
            });

        let mut added = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "skipping unreadable directory entry");
                    continue;
                }
            };
            // `Path::is_file` follows symlinks, so linked files are ingested too.
            if entry.path().is_file() && self.add_if_readable(set, entry.path())? {
                added += 1;
            }
        }
        Ok(added)
    }

    fn add_if_readable(&self, set: &mut ContextSet, path: &Path) -> Result<bool> {
        let absolute = absolute(path)?;
        if set.contains(&absolute) {
            return Ok(false);
        }
        if !is_readable_text(&absolute, self.probe_bytes) {
            warn!(path = %absolute.display(), "not readable as text, skipped");
            return Ok(false);
        }
        Ok(set.insert(absolute))
    }

    /// Add a single file without consulting ignore patterns.
    ///
    /// Used after the engine writes a file so later iterations see its new state.
    pub fn track(&self, path: &Path) -> Result<bool> {
        let mut set = self.load();
        let added = self.add_if_readable(&mut set, path)?;
        if added {
            self.save(&set)?;
        }
        Ok(added)
    }

    /// Remove a file, or every member below a directory. Returns the count removed.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn evict(&self, path: &Path) -> Result<usize> {
        let absolute = absolute(path)?;
        let mut set = self.load();
        let removed = if absolute.is_file() {
            usize::from(set.remove(&absolute))
        } else {
            set.remove_under(&absolute)
        };
        if removed > 0 {
            self.save(&set)?;
        }
        info!(removed, "evicted");
        Ok(removed)
    }

    pub fn evict_all(&self) -> Result<usize> {
        let mut set = self.load();
        let removed = set.clear();
        self.save(&set)?;
        info!(removed, "context cleared");
        Ok(removed)
    }

    /// Read every member into one blob with `### File:` headers.
    ///
    /// Members that can no longer be read are evicted with a warning.
    pub fn materialize(&self, display_root: &Path, verbose: bool) -> Result<String> {
        let mut set = self.load();
        if set.is_empty() {
            warn!("no context files available (use `swe add <path>`)");
            return Ok(String::new());
        }

        let mut blob = String::new();
        let mut unreadable = Vec::new();
        for path in set.paths() {
            if verbose {
                info!(path = %path.display(), "reading file");
            }
            match fs::read_to_string(path) {
                Ok(contents) => {
                    blob.push_str(&format!(
                        "\n\n### File: {}\n\n{}\n",
                        display_path(path, display_root),
                        contents
                    ));
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "could not read file, removed from context");
                    unreadable.push(path.clone());
                }
            }
        }

        if !unreadable.is_empty() {
            for path in &unreadable {
                set.remove(path);
            }
            self.save(&set)?;
        }
        Ok(blob)
    }
}

/// Absolute form of `path` with `.` and `..` folded away, so one file has one entry.
fn absolute(path: &Path) -> Result<PathBuf> {
    let absolute =
        std::path::absolute(path).with_context(|| format!("resolve {}", path.display()))?;
    Ok(lexical_clean(&absolute))
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
