//! Backup vault: timestamped copies of files before they are overwritten.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BackupVault {
    dir: PathBuf,
}

impl BackupVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Copy `source` into the vault as `<basename>.<timestamp>.bak`.
    ///
    /// Never overwrites an earlier backup; a `-N` counter disambiguates
    /// backups taken within the same millisecond.
    pub fn backup(&self, source: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create backup dir {}", self.dir.display()))?;
        let basename = source
            .file_name()
            .with_context(|| format!("backup source has no file name {}", source.display()))?
            .to_string_lossy()
            .into_owned();
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();

        let mut target = self.dir.join(format!("{basename}.{stamp}.bak"));
        let mut counter = 1u32;
        while target.exists() {
            target = self.dir.join(format!("{basename}.{stamp}-{counter}.bak"));
            counter += 1;
        }

        fs::copy(source, &target).with_context(|| {
            format!("back up {} to {}", source.display(), target.display())
        })?;
        debug!(source = %source.display(), backup = %target.display(), "backup written");
        Ok(target)
    }

    /// Backups of files named `basename`, oldest first.
    pub fn backups_of(&self, basename: &str) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{basename}.");
        let mut found = Vec::new();
        for entry in
            fs::read_dir(&self.dir).with_context(|| format!("read {}", self.dir.display()))?
        {
            let entry = entry.with_context(|| format!("read {}", self.dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".bak") {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}
