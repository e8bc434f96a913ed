//! Stores opened from one configuration directory.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::io::backup::BackupVault;
use crate::io::config::{SweConfig, load_config};
use crate::io::context_store::{ContextStore, load_ignore_rules};
use crate::io::history_store::HistoryStore;
use crate::io::init::{SwePaths, init_config_dir};
use crate::io::plan_store::PlanStore;

/// Everything a command needs, built from an explicit configuration directory.
#[derive(Debug, Clone)]
pub struct Session {
    pub paths: SwePaths,
    pub config: SweConfig,
    pub context: ContextStore,
    pub history: HistoryStore,
    pub vault: BackupVault,
    pub plans: PlanStore,
}

impl Session {
    /// Open (and on first use, initialize) the configuration directory.
    pub fn open(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let paths = SwePaths::new(config_dir);
        if !paths.config_dir.exists() {
            debug!(dir = %paths.config_dir.display(), "config dir missing, initializing");
            init_config_dir(&paths)?;
        }
        let config = load_config(&paths.config_path)?;
        let rules = load_ignore_rules(&paths.ignore_path);
        Ok(Self {
            context: ContextStore::new(&paths.context_path, rules, config.readable_probe_bytes),
            history: HistoryStore::new(&paths.history_path),
            vault: BackupVault::new(&paths.backup_dir),
            plans: PlanStore::new(&paths.plan_path),
            config,
            paths,
        })
    }
}
