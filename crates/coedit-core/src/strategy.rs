//! Edit strategies
//!
//! An edit strategy fixes how the model is asked to express changes: a
//! line-range diff, whole-file replacement, or search/replace blocks. The
//! strategy is chosen once when a session is built and never changes.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Closed set of edit formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditFormat {
    /// Unified diff hunks addressed by line range
    LineRangeDiff,
    /// The complete new content of each changed file
    WholeFileReplace,
    /// SEARCH/REPLACE blocks matched against existing text
    SearchReplaceBlock,
}

impl EditFormat {
    /// Parse a discriminator, returning `None` for anything unrecognized.
    /// Matching is exact: `"DIFF"` or `"udiff"` are not `"diff"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "diff" => Some(EditFormat::LineRangeDiff),
            "whole" => Some(EditFormat::WholeFileReplace),
            "editblock" => Some(EditFormat::SearchReplaceBlock),
            _ => None,
        }
    }

    /// Total mapping: unknown discriminators fall back to search/replace blocks
    pub fn resolve(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            warn!(edit_format = %s, "Unknown edit format, using search/replace blocks");
            EditFormat::SearchReplaceBlock
        })
    }

    /// Fail-closed mapping used when strict selection is configured
    pub fn resolve_strict(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::Config(format!("Unknown edit format: {}", s)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditFormat::LineRangeDiff => "diff",
            EditFormat::WholeFileReplace => "whole",
            EditFormat::SearchReplaceBlock => "editblock",
        }
    }
}

impl std::fmt::Display for EditFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session's engine asks for and presents edits
pub trait EditStrategy: Send + Sync {
    /// Which format this strategy implements
    fn format(&self) -> EditFormat;

    /// Instructions placed in the system prompt describing the reply format
    fn instructions(&self) -> &'static str;

    /// Short reminder repeated near the latest message
    fn reminder(&self) -> &'static str;

    /// One worked exchange in this format: a request and a conforming reply
    fn example(&self) -> (&'static str, &'static str);

    /// How a chat file is shown to the model
    fn render_file(&self, path: &str, content: &str) -> String {
        format!("{}\n```\n{}\n```\n", path, content.trim_end_matches('\n'))
    }
}

/// Line-range unified diffs
pub struct LineRangeDiff;

impl EditStrategy for LineRangeDiff {
    fn format(&self) -> EditFormat {
        EditFormat::LineRangeDiff
    }

    fn instructions(&self) -> &'static str {
        "Return edits as unified diffs, like `diff -U0` would produce.\n\
         Start each file with `--- path` and `+++ path` lines.\n\
         Each hunk starts with `@@ ... @@` and must contain every line being removed (`-`) \
         and every line being added (`+`).\n\
         Do not include line numbers in the hunk header. Indentation matters.\n\
         To create a new file, diff from `--- /dev/null`."
    }

    fn reminder(&self) -> &'static str {
        "Reply with unified diffs only for the files you change."
    }

    fn example(&self) -> (&'static str, &'static str) {
        (
            "Rename `greet` to `hello` in app.py",
            "--- app.py\n+++ app.py\n@@ ... @@\n-def greet():\n+def hello():",
        )
    }

    fn render_file(&self, path: &str, content: &str) -> String {
        // Line numbers help the model address ranges precisely
        let numbered: Vec<String> = content
            .lines()
            .enumerate()
            .map(|(i, line)| format!("{:>5} {}", i + 1, line))
            .collect();
        format!("{}\n```\n{}\n```\n", path, numbered.join("\n"))
    }
}

/// Whole-file replacement
pub struct WholeFileReplace;

impl EditStrategy for WholeFileReplace {
    fn format(&self) -> EditFormat {
        EditFormat::WholeFileReplace
    }

    fn instructions(&self) -> &'static str {
        "To change a file, return its complete updated content.\n\
         Put the file path alone on a line, then a fenced code block with the entire file.\n\
         Never elide or summarize unchanged parts with comments like `... rest of file ...`."
    }

    fn reminder(&self) -> &'static str {
        "Return every changed file in full, path first, then a fenced block."
    }

    fn example(&self) -> (&'static str, &'static str) {
        (
            "Rename `greet` to `hello` in app.py",
            "app.py\n```\ndef hello():\n    print(\"hi\")\n```",
        )
    }
}

/// SEARCH/REPLACE blocks
pub struct SearchReplaceBlock;

impl EditStrategy for SearchReplaceBlock {
    fn format(&self) -> EditFormat {
        EditFormat::SearchReplaceBlock
    }

    fn instructions(&self) -> &'static str {
        "Describe each change with a SEARCH/REPLACE block:\n\
         the file path alone on a line, then\n\
         <<<<<<< SEARCH\n\
         a contiguous chunk of the existing file, copied exactly\n\
         =======\n\
         the lines that replace it\n\
         >>>>>>> REPLACE\n\
         Keep SEARCH sections small and unique within the file.\n\
         Use an empty SEARCH section to create a new file."
    }

    fn reminder(&self) -> &'static str {
        "Every edit must use the SEARCH/REPLACE block format."
    }

    fn example(&self) -> (&'static str, &'static str) {
        (
            "Rename `greet` to `hello` in app.py",
            "app.py\n<<<<<<< SEARCH\ndef greet():\n=======\ndef hello():\n>>>>>>> REPLACE",
        )
    }
}

/// Build the strategy for a format
pub fn strategy_for(format: EditFormat) -> Box<dyn EditStrategy> {
    match format {
        EditFormat::LineRangeDiff => Box::new(LineRangeDiff),
        EditFormat::WholeFileReplace => Box::new(WholeFileReplace),
        EditFormat::SearchReplaceBlock => Box::new(SearchReplaceBlock),
    }
}

/// Select a strategy from an edit format discriminator.
///
/// With `strict` unset, unrecognized discriminators fall back to
/// search/replace blocks; with it set they are a configuration error.
pub fn select_strategy(edit_format: &str, strict: bool) -> Result<Box<dyn EditStrategy>> {
    let format = if strict {
        EditFormat::resolve_strict(edit_format)?
    } else {
        EditFormat::resolve(edit_format)
    };
    Ok(strategy_for(format))
}
