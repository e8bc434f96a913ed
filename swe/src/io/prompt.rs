//! Prompt rendering for the command-backed generation service.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use super::generator::{AskRequest, EditRequest, PlanRequest};

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const IMPLEMENT_TEMPLATE: &str = include_str!("prompts/implement.md");
const ASK_TEMPLATE: &str = include_str!("prompts/ask.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("plan", PLAN_TEMPLATE)
            .context("load plan template")?;
        env.add_template("implement", IMPLEMENT_TEMPLATE)
            .context("load implement template")?;
        env.add_template("ask", ASK_TEMPLATE)
            .context("load ask template")?;
        Ok(Self { env })
    }

    pub fn render_plan(&self, request: &PlanRequest) -> Result<String> {
        let template = self.env.get_template("plan")?;
        Ok(template.render(context! {
            goal => request.goal.trim(),
        })?)
    }

    pub fn render_implement(&self, request: &EditRequest) -> Result<String> {
        let template = self.env.get_template("implement")?;
        Ok(template.render(context! {
            goal => request.goal.trim(),
            plan => non_empty(&request.plan),
            context => non_empty(&request.context),
            history => non_empty(&request.history),
        })?)
    }

    pub fn render_ask(&self, request: &AskRequest) -> Result<String> {
        let template = self.env.get_template("ask")?;
        Ok(template.render(context! {
            question => request.question.trim(),
            context => non_empty(&request.context),
            history => non_empty(&request.history),
        })?)
    }
}

fn non_empty(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implement_prompt_carries_all_inputs() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_implement(&EditRequest {
                goal: "add a function".to_string(),
                plan: "1. edit a.py".to_string(),
                context: "### File: a.py\n\nx = 1".to_string(),
                history: "User: add a function".to_string(),
            })
            .expect("render");

        assert!(prompt.contains("add a function"));
        assert!(prompt.contains("1. edit a.py"));
        assert!(prompt.contains("### File: a.py"));
        assert!(prompt.contains("User: add a function"));
        assert!(prompt.contains("\"next_file\""));
    }

    #[test]
    fn empty_sections_render_placeholders() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_implement(&EditRequest {
                goal: "g".to_string(),
                plan: String::new(),
                context: "  ".to_string(),
                history: String::new(),
            })
            .expect("render");

        assert!(prompt.contains("<no plan>"));
        assert!(prompt.contains("<no files in context>"));
        assert!(prompt.contains("<no messages>"));
    }

    #[test]
    fn ask_prompt_omits_empty_history() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_ask(&AskRequest {
                question: "what does a.py do?".to_string(),
                context: "ctx".to_string(),
                history: String::new(),
            })
            .expect("render");

        assert!(prompt.contains("QUESTION: what does a.py do?"));
        assert!(!prompt.contains("conversation so far"));
    }

    #[test]
    fn plan_prompt_names_the_goal() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_plan(&PlanRequest {
                goal: "  add logging ".to_string(),
            })
            .expect("render");
        assert!(prompt.contains("add logging"));
        assert!(prompt.contains("files that must be created or edited"));
    }
}
