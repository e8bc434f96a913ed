//! Configuration-directory layout, initialization and teardown.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use super::config::{SweConfig, write_config};
use crate::core::ignore::default_ignore_file;
use crate::core::types::ContextSet;

/// Canonical paths inside a configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwePaths {
    pub config_dir: PathBuf,
    pub context_path: PathBuf,
    pub history_path: PathBuf,
    pub ignore_path: PathBuf,
    pub plan_path: PathBuf,
    pub config_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl SwePaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            context_path: config_dir.join("context.json"),
            history_path: config_dir.join("chat.json"),
            ignore_path: config_dir.join(".sweignore"),
            plan_path: config_dir.join("planner.txt"),
            config_path: config_dir.join("config.toml"),
            backup_dir: config_dir.join("backup"),
            config_dir,
        }
    }
}

/// What `init_config_dir` created on this call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
}

/// Create the configuration directory and seed missing files.
///
/// Existing files are left untouched, so repeated calls are harmless.
pub fn init_config_dir(paths: &SwePaths) -> Result<InitReport> {
    if paths.config_dir.exists() && !paths.config_dir.is_dir() {
        return Err(anyhow!(
            "{} exists but is not a directory",
            paths.config_dir.display()
        ));
    }
    fs::create_dir_all(&paths.config_dir)
        .with_context(|| format!("create directory {}", paths.config_dir.display()))?;

    let mut report = InitReport::default();
    if !paths.context_path.exists() {
        let mut buf = serde_json::to_string_pretty(&ContextSet::default())?;
        buf.push('\n');
        write_file(&paths.context_path, &buf)?;
        report.created.push(paths.context_path.clone());
    }
    if !paths.ignore_path.exists() {
        write_file(&paths.ignore_path, &default_ignore_file())?;
        report.created.push(paths.ignore_path.clone());
    }
    if !paths.config_path.exists() {
        write_config(&paths.config_path, &SweConfig::default())?;
        report.created.push(paths.config_path.clone());
    }

    debug!(created = report.created.len(), dir = %paths.config_dir.display(), "config dir ready");
    Ok(report)
}

/// Delete the whole configuration directory.
///
/// Returns false when there was nothing to delete.
pub fn remove_config_dir(paths: &SwePaths) -> Result<bool> {
    if !paths.config_dir.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(&paths.config_dir)
        .with_context(|| format!("remove {}", paths.config_dir.display()))?;
    info!(dir = %paths.config_dir.display(), "config dir removed");
    Ok(true)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
