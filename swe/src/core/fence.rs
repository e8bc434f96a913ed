//! Code-fence stripping for generated file content.

use std::sync::LazyLock;

use regex::Regex;

/// Matches content whose first line opens a fence (optional info string) and
/// whose last non-empty line closes it. The interior is captured verbatim.
static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A[ \t]*```[^\n`]*\r?\n(.*?\n)?[ \t]*```[ \t]*(?:\r?\n)*\z")
        .expect("fence regex should be valid")
});

/// Remove a wrapping fenced block from `content`.
///
/// When the whole text is a single fenced block (```` ```lang ```` … ```` ``` ````),
/// the delimiter lines are dropped and the interior lines are returned as-is,
/// including their line endings. Anything else is returned unchanged.
pub fn strip_code_fences(content: &str) -> &str {
    match FENCED_RE.captures(content) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfenced_content_is_untouched() {
        let content = "def f():\n    pass\n";
        assert_eq!(strip_code_fences(content), content);
    }

    #[test]
    fn strips_fence_with_language_tag() {
        let content = "```python\ndef f():\n    pass\n```";
        assert_eq!(strip_code_fences(content), "def f():\n    pass\n");
    }

    #[test]
    fn strips_fence_without_language_tag() {
        let content = "```\nfn main() {}\n```\n";
        assert_eq!(strip_code_fences(content), "fn main() {}\n");
    }

    #[test]
    fn keeps_interior_fences_of_markdown_files() {
        let content = "```markdown\n# Title\n\n```sh\nls\n```\n\nend\n```\n";
        assert_eq!(
            strip_code_fences(content),
            "# Title\n\n```sh\nls\n```\n\nend\n"
        );
    }

    #[test]
    fn empty_fenced_block_yields_empty_content() {
        assert_eq!(strip_code_fences("```rust\n```"), "");
    }

    #[test]
    fn fence_in_the_middle_is_not_a_wrapper() {
        let content = "intro\n```\ncode\n```\n";
        assert_eq!(strip_code_fences(content), content);
    }
}
