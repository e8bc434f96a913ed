//! Implementation engine: plan once, then gather context, generate and write
//! until the service signals there is nothing more to do.
//!
//! One run appends a single user turn carrying the goal, then one assistant
//! turn per generation call. Every write is preceded by a backup of the
//! target's previous contents, and a written file joins the context set so the
//! next iteration sees its new contents.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::core::fence::strip_code_fences;
use crate::core::ignore::lexical_clean;
use crate::core::types::{ConversationTurn, EditInstruction, GenerationResult, History};
use crate::io::generator::{EditRequest, GenerationService};
use crate::plan::generate_plan;
use crate::session::Session;

/// Per-run settings for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Relative target paths resolve against this directory.
    pub workdir: PathBuf,
    /// Hard cap on Generate calls within one run.
    pub max_iterations: u32,
    /// Log each context file read (`info!`, stderr) while gathering context.
    pub verbose: bool,
}

impl EngineConfig {
    pub fn new(workdir: impl Into<PathBuf>, max_iterations: u32) -> Self {
        Self {
            workdir: workdir.into(),
            max_iterations,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImplementOptions {
    /// Reuse the persisted plan instead of asking for a new one, when one exists.
    pub reuse_plan: bool,
}

/// Reason why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// The last instruction was written and named no follow-up file.
    Completed,
    /// The instruction named the sentinel target or carried empty content.
    NothingToWrite { reason: String },
    /// The response could not be read as an edit instruction.
    Malformed { raw: String },
    /// The plan call failed, so the loop never started.
    PlanFailed { error: String },
    /// A Generate call failed.
    ServiceFailed { error: String },
    /// Backing up or writing the target failed.
    WriteFailed { path: PathBuf, error: String },
    /// The instruction asked for another file but the iteration cap was reached.
    MaxIterationsExceeded { max_iterations: u32 },
}

impl RunStop {
    /// Whether the run ended the way the service asked it to.
    pub fn is_clean(&self) -> bool {
        matches!(self, RunStop::Completed | RunStop::NothingToWrite { .. })
    }
}

/// One successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub iteration: u32,
    pub path: PathBuf,
    pub backup: PathBuf,
    /// The target did not exist before this write.
    pub created: bool,
    pub next_file: Option<String>,
}

/// Summary of an implement run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementOutcome {
    pub goal: String,
    pub plan: String,
    pub last_written: Option<PathBuf>,
    pub history: History,
    /// Generate calls made.
    pub iterations: u32,
    pub writes: u32,
    pub stop: RunStop,
}

/// Context and history read at the start of an iteration.
struct Gathered {
    context: String,
    history: History,
}

enum WriteStep {
    Written(WriteReport),
    Skipped(String),
    Failed { path: PathBuf, error: String },
}

/// Plan, then run the edit loop for `goal`.
///
/// A failing plan call ends the run with [`RunStop::PlanFailed`] before any
/// history is recorded.
pub fn implement<G: GenerationService, F: FnMut(&WriteReport)>(
    session: &Session,
    service: &G,
    goal: &str,
    options: &ImplementOptions,
    config: &EngineConfig,
    on_write: F,
) -> Result<ImplementOutcome> {
    let saved = if options.reuse_plan {
        session.plans.read()?
    } else {
        String::new()
    };

    let plan = if !saved.trim().is_empty() {
        info!("reusing saved plan");
        saved
    } else {
        match generate_plan(service, &session.plans, goal) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "plan stage failed");
                return Ok(ImplementOutcome {
                    goal: goal.to_string(),
                    plan: String::new(),
                    last_written: None,
                    history: session.history.load(),
                    iterations: 0,
                    writes: 0,
                    stop: RunStop::PlanFailed {
                        error: format!("{err:#}"),
                    },
                });
            }
        }
    };

    run_loop(session, service, goal, &plan, config, on_write)
}

/// Run the GatherContext, Generate, WriteFile cycle with an existing plan.
///
/// Only failures of the context or history stores themselves surface as
/// errors. Anything the service or the target filesystem does wrong ends the
/// run with a [`RunStop`] instead.
pub fn run_loop<G: GenerationService, F: FnMut(&WriteReport)>(
    session: &Session,
    service: &G,
    goal: &str,
    plan: &str,
    config: &EngineConfig,
    mut on_write: F,
) -> Result<ImplementOutcome> {
    let mut history = session.history.load();
    history.append(ConversationTurn::user(goal));
    session.history.save(&history);

    let mut iterations = 0u32;
    let mut writes = 0u32;
    let mut last_written = None;

    let stop = loop {
        if iterations >= config.max_iterations {
            warn!(max_iterations = config.max_iterations, "iteration cap reached");
            break RunStop::MaxIterationsExceeded {
                max_iterations: config.max_iterations,
            };
        }
        iterations += 1;

        debug!(iteration = iterations, "gather context");
        let gathered = gather(session, config)?;

        debug!(iteration = iterations, "generate");
        let request = EditRequest {
            goal: goal.to_string(),
            plan: plan.to_string(),
            context: gathered.context,
            history: gathered.history.format(),
        };
        let result = match service.generate_edit(&request) {
            Ok(result) => result,
            Err(err) => {
                error!(iteration = iterations, error = %format!("{err:#}"), "generation failed");
                history = gathered.history;
                break RunStop::ServiceFailed {
                    error: format!("{err:#}"),
                };
            }
        };

        history = gathered.history;
        history.append(ConversationTurn::assistant(result.transcript()));
        session.history.save(&history);

        let instruction = match result {
            GenerationResult::Parsed(instruction) => instruction,
            GenerationResult::Malformed(raw) => {
                error!(iteration = iterations, "response is not an edit instruction");
                break RunStop::Malformed { raw };
            }
        };

        debug!(iteration = iterations, %instruction, "write file");
        match write_file(session, config, iterations, &instruction) {
            WriteStep::Skipped(reason) => {
                info!(iteration = iterations, %reason, "nothing to write");
                break RunStop::NothingToWrite { reason };
            }
            WriteStep::Failed { path, error } => break RunStop::WriteFailed { path, error },
            WriteStep::Written(report) => {
                writes += 1;
                last_written = Some(report.path.clone());
                on_write(&report);
                if !instruction.wants_next() {
                    break RunStop::Completed;
                }
            }
        }
    };

    info!(iterations, writes, clean = stop.is_clean(), ?stop, "run finished");
    Ok(ImplementOutcome {
        goal: goal.to_string(),
        plan: plan.to_string(),
        last_written,
        history,
        iterations,
        writes,
        stop,
    })
}

fn gather(session: &Session, config: &EngineConfig) -> Result<Gathered> {
    let context = session
        .context
        .materialize(&config.workdir, config.verbose)
        .context("materialize context")?;
    Ok(Gathered {
        context,
        history: session.history.load(),
    })
}

fn write_file(
    session: &Session,
    config: &EngineConfig,
    iteration: u32,
    instruction: &EditInstruction,
) -> WriteStep {
    let Some(target) = instruction.target() else {
        return WriteStep::Skipped("no target file".to_string());
    };
    let content = strip_code_fences(&instruction.content);
    if content.trim().is_empty() {
        return WriteStep::Skipped(format!("empty content for {target}"));
    }

    let path = resolve_target(&config.workdir, target);
    match apply_write(session, &path, content) {
        Ok((backup, created)) => {
            info!(path = %path.display(), backup = %backup.display(), created, "file written");
            WriteStep::Written(WriteReport {
                iteration,
                path,
                backup,
                created,
                next_file: instruction
                    .wants_next()
                    .then(|| instruction.next_file.trim().to_string()),
            })
        }
        Err(err) => {
            error!(path = %path.display(), error = %format!("{err:#}"), "write failed");
            WriteStep::Failed {
                path,
                error: format!("{err:#}"),
            }
        }
    }
}

fn apply_write(session: &Session, path: &Path, content: &str) -> Result<(PathBuf, bool)> {
    let created = !path.exists();
    if created {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::File::create_new(path)
            .with_context(|| format!("create placeholder {}", path.display()))?;
    }

    let backup = session.vault.backup(path)?;
    fs::write(path, content).with_context(|| format!("write {}", path.display()))?;
    session.context.track(path)?;
    Ok((backup, created))
}

fn resolve_target(workdir: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        lexical_clean(target)
    } else {
        lexical_clean(&workdir.join(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use crate::test_support::{ScriptedGenerator, TestWorkspace, edit};

    fn run(ws: &TestWorkspace, service: &ScriptedGenerator, goal: &str) -> ImplementOutcome {
        implement(
            &ws.session,
            service,
            goal,
            &ImplementOptions::default(),
            &ws.engine_config(),
            |_| {},
        )
        .expect("implement")
    }

    #[test]
    fn single_write_then_completed() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(vec![edit("a.py", "print(1)", "none")]);

        let outcome = run(&ws, &service, "write a.py");

        assert_eq!(outcome.stop, RunStop::Completed);
        assert_eq!(outcome.writes, 1);
        let path = ws.project().join("a.py");
        assert_eq!(fs::read_to_string(&path).expect("read"), "print(1)");
        assert_eq!(outcome.last_written, Some(path.clone()));
        assert!(ws.session.context.list().contains(&path));
    }

    #[test]
    fn sentinel_target_writes_nothing() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(vec![edit("none", "ignored", "none")]);

        let outcome = run(&ws, &service, "goal");

        assert!(matches!(outcome.stop, RunStop::NothingToWrite { .. }));
        assert_eq!(outcome.writes, 0);
        assert!(ws.session.vault.backups_of("none").expect("list").is_empty());
    }

    #[test]
    fn fenced_content_is_unwrapped_before_writing() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(vec![edit(
            "b.rs",
            "```rust\nfn main() {}\n```",
            "",
        )]);

        run(&ws, &service, "goal");

        let written = fs::read_to_string(ws.project().join("b.rs")).expect("read");
        assert_eq!(written, "fn main() {}\n");
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(vec![edit("src/deep/mod.rs", "// mod", "none")]);

        let outcome = run(&ws, &service, "goal");

        assert_eq!(outcome.stop, RunStop::Completed);
        assert!(ws.project().join("src/deep/mod.rs").is_file());
    }

    #[test]
    fn service_error_stops_run_with_goal_in_history() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(Vec::new());

        let outcome = run(&ws, &service, "goal");

        assert!(matches!(outcome.stop, RunStop::ServiceFailed { .. }));
        let history = ws.session.history.load();
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].role, Role::User);
    }

    #[test]
    fn plan_failure_stops_before_loop() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(vec![edit("a.py", "x", "none")]).failing_plan("down");

        let outcome = run(&ws, &service, "goal");

        assert!(matches!(outcome.stop, RunStop::PlanFailed { .. }));
        assert_eq!(outcome.iterations, 0);
        assert!(ws.session.history.load().is_empty());
        assert!(!ws.project().join("a.py").exists());
    }

    #[test]
    fn write_onto_directory_reports_write_failure() {
        let ws = TestWorkspace::new().expect("workspace");
        fs::create_dir_all(ws.project().join("pkg")).expect("mkdir");
        let service = ScriptedGenerator::new(vec![edit("pkg", "x", "none")]);

        let outcome = run(&ws, &service, "goal");

        match outcome.stop {
            RunStop::WriteFailed { path, .. } => assert_eq!(path, ws.project().join("pkg")),
            other => panic!("unexpected stop: {other:?}"),
        }
    }

    #[test]
    fn absolute_targets_are_used_as_given() {
        let ws = TestWorkspace::new().expect("workspace");
        let outside = ws.root().join("outside.txt");
        let service = ScriptedGenerator::new(vec![edit(
            outside.to_str().expect("utf-8 path"),
            "hello",
            "none",
        )]);

        run(&ws, &service, "goal");

        assert_eq!(fs::read_to_string(outside).expect("read"), "hello");
    }

    #[test]
    fn dotted_target_is_written_and_tracked_once() {
        let ws = TestWorkspace::new().expect("workspace");
        let a = ws.write_file("a.py", "old\n").expect("write");
        ws.session.context.ingest(&a).expect("ingest");
        let service = ScriptedGenerator::new(vec![edit("src/../a.py", "new\n", "none")]);

        let outcome = run(&ws, &service, "goal");

        assert_eq!(outcome.last_written, Some(a.clone()));
        assert_eq!(fs::read_to_string(&a).expect("read"), "new\n");
        assert_eq!(ws.session.context.list(), vec![a]);
    }

    #[test]
    fn on_write_sees_each_report() {
        let ws = TestWorkspace::new().expect("workspace");
        let service = ScriptedGenerator::new(vec![
            edit("a.txt", "a", "b.txt"),
            edit("b.txt", "b", "none"),
        ]);
        let mut seen = Vec::new();

        implement(
            &ws.session,
            &service,
            "goal",
            &ImplementOptions::default(),
            &ws.engine_config(),
            |report| seen.push((report.iteration, report.next_file.clone())),
        )
        .expect("implement");

        assert_eq!(seen, vec![(1, Some("b.txt".to_string())), (2, None)]);
    }

    #[test]
    fn run_stop_cleanliness() {
        assert!(RunStop::Completed.is_clean());
        assert!(
            RunStop::NothingToWrite {
                reason: String::new()
            }
            .is_clean()
        );
        assert!(!RunStop::MaxIterationsExceeded { max_iterations: 1 }.is_clean());
    }
}
