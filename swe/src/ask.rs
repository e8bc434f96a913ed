//! Free-form question answering over the current context and history.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::ConversationTurn;
use crate::io::generator::{AskRequest, GenerationService};
use crate::session::Session;

/// Answer `question`, recording both the question and the answer in history.
pub fn ask<G: GenerationService>(
    session: &Session,
    service: &G,
    question: &str,
    display_root: &Path,
    verbose: bool,
) -> Result<String> {
    let context = session
        .context
        .materialize(display_root, verbose)
        .context("materialize context")?;
    let mut history = session.history.load();
    let answer = service.answer(&AskRequest {
        question: question.to_string(),
        context,
        history: history.format(),
    })?;

    history.append(ConversationTurn::user(question));
    history.append(ConversationTurn::assistant(answer.clone()));
    session.history.save(&history);
    Ok(answer)
}
