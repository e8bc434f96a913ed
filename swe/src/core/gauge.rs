//! Context usage gauge shown by `swe context`.

/// Token budget the gauge is drawn against.
pub const DEFAULT_TOKEN_BUDGET: usize = 128_000;

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Token usage split between context and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub context_tokens: usize,
    pub history_tokens: usize,
    pub budget: usize,
}

impl Usage {
    pub fn total(&self) -> usize {
        self.context_tokens + self.history_tokens
    }

    pub fn percent(&self) -> f64 {
        if self.budget == 0 {
            return 100.0;
        }
        self.total() as f64 / self.budget as f64 * 100.0
    }

    /// Render `[context|history|free]` with `width` cells of fill.
    pub fn render_bar(&self, width: usize) -> String {
        let cells = |tokens: usize| -> usize {
            if self.budget == 0 {
                return 0;
            }
            (tokens.saturating_mul(width) / self.budget).min(width)
        };
        let context_fill = cells(self.context_tokens);
        let history_fill = cells(self.history_tokens).min(width - context_fill);
        let empty_fill = width - context_fill - history_fill;
        format!(
            "[{}|{}|{}]",
            "█".repeat(context_fill),
            "█".repeat(history_fill),
            "░".repeat(empty_fill)
        )
    }
}
