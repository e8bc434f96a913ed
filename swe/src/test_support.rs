//! Test-only helpers: a scripted generation service and a throwaway workspace.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{EditInstruction, GenerationResult};
use crate::implement::EngineConfig;
use crate::io::generator::{AskRequest, EditRequest, GenerationService, PlanRequest};
use crate::session::Session;

/// Build a parsed edit instruction.
pub fn edit(file: &str, content: &str, next_file: &str) -> GenerationResult {
    GenerationResult::Parsed(EditInstruction::new(file, content, next_file))
}

/// Generation service that replays queued responses and records requests.
///
/// An exhausted queue answers with an error, which is how tests simulate a
/// service outage.
#[derive(Debug)]
pub struct ScriptedGenerator {
    plan: std::result::Result<String, String>,
    edits: RefCell<VecDeque<GenerationResult>>,
    answers: RefCell<VecDeque<String>>,
    plan_calls: Cell<u32>,
    edit_requests: RefCell<Vec<EditRequest>>,
    ask_requests: RefCell<Vec<AskRequest>>,
}

impl ScriptedGenerator {
    pub fn new(edits: Vec<GenerationResult>) -> Self {
        Self {
            plan: Ok("1. make the change".to_string()),
            edits: RefCell::new(edits.into()),
            answers: RefCell::new(VecDeque::new()),
            plan_calls: Cell::new(0),
            edit_requests: RefCell::new(Vec::new()),
            ask_requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_plan(mut self, plan: &str) -> Self {
        self.plan = Ok(plan.to_string());
        self
    }

    /// Make every plan call fail with `message`.
    pub fn failing_plan(mut self, message: &str) -> Self {
        self.plan = Err(message.to_string());
        self
    }

    pub fn with_answers<'a>(self, answers: impl IntoIterator<Item = &'a str>) -> Self {
        self.answers
            .borrow_mut()
            .extend(answers.into_iter().map(str::to_string));
        self
    }

    pub fn plan_calls(&self) -> u32 {
        self.plan_calls.get()
    }

    pub fn edit_requests(&self) -> Vec<EditRequest> {
        self.edit_requests.borrow().clone()
    }

    pub fn ask_requests(&self) -> Vec<AskRequest> {
        self.ask_requests.borrow().clone()
    }

    /// Responses still queued.
    pub fn remaining_edits(&self) -> usize {
        self.edits.borrow().len()
    }
}

impl GenerationService for ScriptedGenerator {
    fn plan(&self, _request: &PlanRequest) -> Result<String> {
        self.plan_calls.set(self.plan_calls.get() + 1);
        self.plan.clone().map_err(|message| anyhow!(message))
    }

    fn generate_edit(&self, request: &EditRequest) -> Result<GenerationResult> {
        self.edit_requests.borrow_mut().push(request.clone());
        self.edits
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted generator has no edit response left"))
    }

    fn answer(&self, request: &AskRequest) -> Result<String> {
        self.ask_requests.borrow_mut().push(request.clone());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted generator has no answer left"))
    }
}

/// Temporary directory holding a project tree and an initialized config dir.
pub struct TestWorkspace {
    temp: TempDir,
    pub session: Session,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        fs::create_dir_all(temp.path().join("project")).context("create project dir")?;
        let session = Session::open(temp.path().join(".swe"))?;
        Ok(Self { temp, session })
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn project(&self) -> PathBuf {
        self.temp.path().join("project")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.session.paths.config_dir.clone()
    }

    /// Write `contents` to `rel` under the project, creating parents.
    pub fn write_file(&self, rel: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.project().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Engine settings rooted at the project with the session's iteration cap.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.project(), self.session.config.max_iterations)
    }
}
