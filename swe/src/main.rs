//! `swe`: context-aware code-generation CLI.
//!
//! Keeps a working set of files as context, a persisted conversation, and
//! drives an external generation command to edit the project one file at a
//! time.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use swe::ask::ask;
use swe::core::gauge::{DEFAULT_TOKEN_BUDGET, Usage, estimate_tokens};
use swe::exit_codes;
use swe::implement::{EngineConfig, ImplementOptions, ImplementOutcome, RunStop, implement};
use swe::io::context_store::display_path;
use swe::io::generator::CommandGenerator;
use swe::io::init::{SwePaths, init_config_dir, remove_config_dir};
use swe::logging;
use swe::session::Session;

const GAUGE_WIDTH: usize = 40;

#[derive(Parser)]
#[command(
    name = "swe",
    version,
    about = "Iterative code generation against a working set of context files"
)]
struct Cli {
    /// Configuration directory (defaults to `$HOME/.swe`).
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the configuration directory and default files if missing.
    Init,
    /// Add a file or directory to the context.
    Add { path: PathBuf },
    /// Remove a file, or every context file below a directory.
    Rm { path: PathBuf },
    /// List context files with a token usage gauge.
    Context,
    /// Remove every file from the context.
    Clear,
    /// Ask a question about the context files.
    Ask {
        question: String,
        #[arg(short, long)]
        verbose: bool,
    },
    /// Plan and apply file edits until the goal is reached.
    Implement {
        goal: String,
        #[arg(short, long)]
        verbose: bool,
        /// Reuse the last saved plan instead of generating a new one.
        #[arg(long)]
        resume: bool,
        /// Override the configured iteration cap.
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        max_iterations: Option<u32>,
    },
    /// Start a new conversation (clears history and the saved plan).
    New,
    /// Print the conversation history.
    History,
    /// Print the last generated plan.
    Plan,
    /// Delete the configuration directory.
    Uninstall,
}

impl Command {
    fn verbose(&self) -> bool {
        matches!(
            self,
            Command::Ask { verbose: true, .. } | Command::Implement { verbose: true, .. }
        )
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.command.verbose());
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    let paths = SwePaths::new(&config_dir);
    let cwd = env::current_dir().context("resolve current directory")?;

    match cli.command {
        Command::Init => cmd_init(&paths),
        Command::Uninstall => cmd_uninstall(&paths),
        Command::Add { path } => cmd_add(&Session::open(&config_dir)?, &path),
        Command::Rm { path } => cmd_rm(&Session::open(&config_dir)?, &path),
        Command::Context => cmd_context(&Session::open(&config_dir)?, &cwd),
        Command::Clear => {
            let removed = Session::open(&config_dir)?.context.evict_all()?;
            println!("Removed {removed} file(s) from context.");
            Ok(exit_codes::OK)
        }
        Command::Ask { question, verbose } => {
            let session = Session::open(&config_dir)?;
            let service = CommandGenerator::new(session.config.generator.clone())?;
            let answer = ask(&session, &service, &question, &cwd, verbose)?;
            println!("{answer}");
            Ok(exit_codes::OK)
        }
        Command::Implement {
            goal,
            verbose,
            resume,
            max_iterations,
        } => {
            let session = Session::open(&config_dir)?;
            let engine = EngineConfig {
                workdir: cwd.clone(),
                max_iterations: max_iterations.unwrap_or(session.config.max_iterations),
                verbose,
            };
            cmd_implement(&session, &goal, resume, &engine)
        }
        Command::New => {
            let session = Session::open(&config_dir)?;
            session.history.clear()?;
            session.plans.clear()?;
            println!("Started a new conversation.");
            Ok(exit_codes::OK)
        }
        Command::History => {
            let history = Session::open(&config_dir)?.history.load();
            if history.is_empty() {
                println!("No messages yet.");
            } else {
                println!("{}", history.format());
            }
            Ok(exit_codes::OK)
        }
        Command::Plan => {
            let plan = Session::open(&config_dir)?.plans.read()?;
            if plan.trim().is_empty() {
                println!("No plan saved.");
            } else {
                println!("{}", plan.trim_end());
            }
            Ok(exit_codes::OK)
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set; pass --config-dir"))?;
    Ok(PathBuf::from(home).join(".swe"))
}

fn cmd_init(paths: &SwePaths) -> Result<i32> {
    let report = init_config_dir(paths)?;
    if report.created.is_empty() {
        println!("Configuration already present at {}", paths.config_dir.display());
    } else {
        for path in &report.created {
            println!("Created {}", path.display());
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_uninstall(paths: &SwePaths) -> Result<i32> {
    if remove_config_dir(paths)? {
        println!("Removed {}", paths.config_dir.display());
    } else {
        println!("Nothing to remove at {}", paths.config_dir.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_add(session: &Session, path: &Path) -> Result<i32> {
    let added = session.context.ingest(path)?;
    println!("Added {added} file(s) to context.");
    Ok(exit_codes::OK)
}

fn cmd_rm(session: &Session, path: &Path) -> Result<i32> {
    let removed = session.context.evict(path)?;
    if removed == 0 {
        println!("{} is not in the context.", path.display());
    } else {
        println!("Removed {removed} file(s) from context.");
    }
    Ok(exit_codes::OK)
}

fn cmd_context(session: &Session, cwd: &Path) -> Result<i32> {
    let blob = session.context.materialize(cwd, false)?;
    let history = session.history.load().format();
    let usage = Usage {
        context_tokens: estimate_tokens(&blob),
        history_tokens: estimate_tokens(&history),
        budget: DEFAULT_TOKEN_BUDGET,
    };

    println!("Token usage: {:.2}% of {}", usage.percent(), usage.budget);
    println!("{}", usage.render_bar(GAUGE_WIDTH));
    println!("Context files:");
    for path in session.context.list() {
        println!("    + {}", display_path(&path, cwd));
    }
    Ok(exit_codes::OK)
}

fn cmd_implement(
    session: &Session,
    goal: &str,
    resume: bool,
    engine: &EngineConfig,
) -> Result<i32> {
    let service = CommandGenerator::new(session.config.generator.clone())?;
    let options = ImplementOptions { reuse_plan: resume };
    let outcome = implement(session, &service, goal, &options, engine, |report| {
        println!(
            "Implemented changes in {} (backup: {})",
            display_path(&report.path, &engine.workdir),
            report.backup.display()
        );
    })?;
    Ok(report_outcome(&outcome))
}

fn report_outcome(outcome: &ImplementOutcome) -> i32 {
    match &outcome.stop {
        RunStop::Completed => {
            println!("Done: {} file(s) written.", outcome.writes);
            exit_codes::OK
        }
        RunStop::NothingToWrite { reason } => {
            println!("Stopped: {reason}. {} file(s) written.", outcome.writes);
            exit_codes::OK
        }
        RunStop::Malformed { raw } => {
            eprintln!("Response is not a valid edit instruction, run aborted:\n{raw}");
            exit_codes::INCOMPLETE
        }
        RunStop::PlanFailed { error } => {
            eprintln!("Error generating plan: {error}");
            exit_codes::INCOMPLETE
        }
        RunStop::ServiceFailed { error } => {
            eprintln!("Error generating response: {error}");
            exit_codes::INCOMPLETE
        }
        RunStop::WriteFailed { path, error } => {
            eprintln!("Error writing {}: {error}", path.display());
            exit_codes::INCOMPLETE
        }
        RunStop::MaxIterationsExceeded { max_iterations } => {
            eprintln!(
                "Stopped after {max_iterations} iteration(s) with more files requested; \
                 rerun with --resume to continue."
            );
            exit_codes::MAX_ITERATIONS
        }
    }
}
