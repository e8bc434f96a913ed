//! Generation service abstraction.
//!
//! The [`GenerationService`] trait decouples the pipeline from the actual
//! code-generation backend. [`CommandGenerator`] pipes rendered prompts into a
//! configured command; tests use scripted services that return predetermined
//! results without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use jsonschema::validator_for;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::config::GeneratorConfig;
use super::process::run_command_with_timeout;
use super::prompt::PromptEngine;
use crate::core::fence::strip_code_fences;
use crate::core::types::{EditInstruction, GenerationResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub goal: String,
}

/// Inputs of one Generate step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub goal: String,
    pub plan: String,
    /// Materialized context blob.
    pub context: String,
    /// History rendered as `Role: content` lines.
    pub history: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
    pub context: String,
    pub history: String,
}

/// Abstraction over code-generation backends.
///
/// `Err` means the service could not be reached or failed to run. A service
/// that answers with an unusable edit returns [`GenerationResult::Malformed`].
pub trait GenerationService {
    fn plan(&self, request: &PlanRequest) -> Result<String>;

    fn generate_edit(&self, request: &EditRequest) -> Result<GenerationResult>;

    fn answer(&self, request: &AskRequest) -> Result<String>;
}

/// Generation service backed by an external command (prompt on stdin, completion on stdout).
pub struct CommandGenerator {
    config: GeneratorConfig,
    prompts: PromptEngine,
}

impl CommandGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        Ok(Self {
            config,
            prompts: PromptEngine::new()?,
        })
    }

    #[instrument(skip(self, prompt))]
    fn complete(&self, kind: &str, prompt: &str) -> Result<String> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("generator.command must be a non-empty array"))?;
        debug!(kind, prompt_bytes = prompt.len(), "prompt rendered");
        debug!(kind, prompt, "prompt to generator");

        let mut cmd = Command::new(program);
        cmd.args(args);
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            timeout,
            self.config.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(timeout_secs = timeout.as_secs(), "generator timed out");
            return Err(anyhow!("generator timed out after {timeout:?}"));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(anyhow!(
                "generator exited with status {:?}: {}",
                output.status.code(),
                output.stderr_text().trim()
            ));
        }
        info!(kind, response_bytes = output.stdout.len(), "generator completed");
        Ok(output.stdout_text())
    }
}

impl GenerationService for CommandGenerator {
    fn plan(&self, request: &PlanRequest) -> Result<String> {
        let prompt = self.prompts.render_plan(request)?;
        self.complete("plan", &prompt)
    }

    fn generate_edit(&self, request: &EditRequest) -> Result<GenerationResult> {
        let prompt = self.prompts.render_implement(request)?;
        let raw = self.complete("edit", &prompt)?;
        Ok(parse_edit_response(&raw))
    }

    fn answer(&self, request: &AskRequest) -> Result<String> {
        let prompt = self.prompts.render_ask(request)?;
        self.complete("ask", &prompt)
    }
}

fn edit_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": {
            "file": { "type": "string" },
            "content": { "type": "string" },
            "next_file": { "type": ["string", "null"] },
            "next_file_to_implement": { "type": ["string", "null"] }
        }
    })
}

/// Parse raw generator output into an edit instruction.
///
/// Accepts a bare JSON object or one wrapped in a code fence. Anything that is
/// not an object with string-typed fields is `Malformed`. Absent fields are
/// empty, which the engine treats as a request to stop.
pub fn parse_edit_response(raw: &str) -> GenerationResult {
    match try_parse_edit(raw) {
        Ok(instruction) => GenerationResult::Parsed(instruction),
        Err(err) => {
            warn!(%err, "malformed edit response");
            GenerationResult::Malformed(raw.to_string())
        }
    }
}

fn try_parse_edit(raw: &str) -> Result<EditInstruction> {
    let body = strip_code_fences(raw.trim());
    let mut value: Value = serde_json::from_str(body.trim())?;

    let schema = edit_schema();
    let validator = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {err}"))?;
    let messages: Vec<String> = validator
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "edit response schema validation failed: {}",
            messages.join("; ")
        ));
    }

    // A null next file means "no next file".
    if let Some(object) = value.as_object_mut() {
        object.retain(|_, v| !v.is_null());
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_object() {
        let result =
            parse_edit_response(r#"{"file": "a.py", "content": "def f(): pass", "next_file": "none"}"#);
        assert_eq!(
            result,
            GenerationResult::Parsed(EditInstruction::new("a.py", "def f(): pass", "none"))
        );
    }

    #[test]
    fn parses_fenced_json_with_long_field_name() {
        let raw = "```json\n{\"file\": \"b.py\", \"content\": \"x\", \"next_file_to_implement\": null}\n```\n";
        let GenerationResult::Parsed(instruction) = parse_edit_response(raw) else {
            panic!("expected parsed instruction");
        };
        assert_eq!(instruction.file, "b.py");
        assert!(!instruction.wants_next());
    }

    #[test]
    fn missing_fields_parse_as_empty() {
        let GenerationResult::Parsed(instruction) = parse_edit_response(r#"{"file": "a.py"}"#)
        else {
            panic!("expected parsed instruction");
        };
        assert_eq!(instruction.content, "");
    }

    #[test]
    fn prose_is_malformed() {
        let raw = "Sure! Here is the file you asked for.";
        assert_eq!(
            parse_edit_response(raw),
            GenerationResult::Malformed(raw.to_string())
        );
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        let raw = r#"{"file": ["a.py"], "content": 3}"#;
        assert!(matches!(
            parse_edit_response(raw),
            GenerationResult::Malformed(_)
        ));
        assert!(matches!(
            parse_edit_response("[1, 2]"),
            GenerationResult::Malformed(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_pipes_prompt_through_command() {
        let generator = CommandGenerator::new(GeneratorConfig {
            command: vec!["cat".to_string()],
            ..GeneratorConfig::default()
        })
        .expect("generator");
        let plan = generator
            .plan(&PlanRequest {
                goal: "add logging".to_string(),
            })
            .expect("plan");
        assert!(plan.contains("add logging"));
    }

    #[cfg(unix)]
    #[test]
    fn command_generator_reports_failing_command() {
        let generator = CommandGenerator::new(GeneratorConfig {
            command: vec!["false".to_string()],
            ..GeneratorConfig::default()
        })
        .expect("generator");
        let err = generator
            .plan(&PlanRequest {
                goal: "g".to_string(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("exited with status"));
    }
}
