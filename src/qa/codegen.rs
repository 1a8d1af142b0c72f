//! Generated-code hygiene and security screening.
//!
//! Raw LLM output is fenced, echoed, and occasionally polluted; this module
//! extracts the code, strips artifacts, and refuses snippets that smell of
//! system access before anything reaches the executor. The substring screen
//! is a cheap first gate, not the sandbox — the executor behind it only
//! understands an allow-listed set of table operations in the first place.

use crate::error::{InsightError, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Substrings that indicate an attempt at system access. Any hit rejects
/// the snippet outright, before execution.
const DENYLIST: &[&str] = &[
    "os.",
    "sys.",
    "subprocess",
    "eval(",
    "exec(",
    "std::process",
    "Command::new",
    "import ",
    "__",
];

/// Tokens that make a bare `open(` acceptable (plotting, dataframe, array
/// and temp-file helpers legitimately open files). Known-porous heuristic,
/// kept as an extra screen in front of the allow-list executor.
const OPEN_ALLOW_TOKENS: &[&str] = &["plt", "pd", "np", "tempfile"];

lazy_static! {
    static ref FENCE_RE: Regex =
        Regex::new(r"```[a-zA-Z]*\n?((?s).*?)```").expect("valid fence regex");
    static ref OPEN_FENCE_RE: Regex =
        Regex::new(r"```[a-zA-Z]*\n?((?s).*)").expect("valid open fence regex");
}

/// Pull the code out of a fenced block, falling back to the raw text when
/// no fence markers are present.
pub fn extract_code_block(raw: &str) -> String {
    if let Some(captures) = FENCE_RE.captures(raw) {
        return captures[1].trim().to_string();
    }
    // Unterminated fence: take everything after the opening marker.
    if let Some(captures) = OPEN_FENCE_RE.captures(raw) {
        return captures[1].trim().to_string();
    }
    raw.trim().to_string()
}

/// Drop blank lines and LLM echo artifacts (any line containing a literal
/// "undefined" token).
pub fn clean_generated_code(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim().is_empty() && !line.to_lowercase().contains("undefined"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove print statements so narration prompts see only the logic.
pub fn strip_print_statements(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim_start().starts_with("print("))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Refuse snippets containing denylisted substrings. Returns the blocked
/// reason as a distinct error kind so callers can report it as a security
/// rejection rather than an execution failure.
pub fn screen_code(code: &str) -> Result<()> {
    for banned in DENYLIST {
        if code.contains(banned) {
            return Err(InsightError::Blocked(
                "unsafe code (system access)".to_string(),
            ));
        }
    }

    if code.contains("open(") && !OPEN_ALLOW_TOKENS.iter().any(|t| code.contains(t)) {
        return Err(InsightError::Blocked("unsafe file access".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_python_fence() {
        let raw = "Here you go:\n```python\nresult = df.count()\n```\nDone.";
        assert_eq!(extract_code_block(raw), "result = df.count()");
    }

    #[test]
    fn test_extract_bare_fence() {
        let raw = "```\nresult = df.count()\n```";
        assert_eq!(extract_code_block(raw), "result = df.count()");
    }

    #[test]
    fn test_no_fence_falls_back_to_raw() {
        assert_eq!(extract_code_block("result = df.count()"), "result = df.count()");
    }

    #[test]
    fn test_unterminated_fence() {
        let raw = "```\nresult = df.count()";
        assert_eq!(extract_code_block(raw), "result = df.count()");
    }

    #[test]
    fn test_clean_drops_undefined_lines() {
        let code = "result = df.count()\nundefined\n\nUNDEFINED value";
        assert_eq!(clean_generated_code(code), "result = df.count()");
    }

    #[test]
    fn test_strip_print_statements() {
        let code = "print(\"debug\")\nresult = df.count()\n  print(result)";
        assert_eq!(strip_print_statements(code), "result = df.count()");
    }

    #[test]
    fn test_denylist_rejection_is_total() {
        let attempts = [
            "import os\nos.system(\"rm -rf /\")",
            "result = eval(\"1+1\")",
            "exec(code)",
            "subprocess.run([\"ls\"])",
            "sys.exit(0)",
            "std::process::Command::new(\"sh\")",
            "x.__class__.__bases__",
        ];
        for attempt in attempts {
            let err = screen_code(attempt).unwrap_err();
            assert!(
                matches!(err, InsightError::Blocked(_)),
                "expected block for: {}",
                attempt
            );
        }
    }

    #[test]
    fn test_open_requires_allow_token() {
        assert!(screen_code("open(\"/etc/passwd\")").is_err());
        // The documented bypass: an allow token anywhere in the snippet.
        assert!(screen_code("open(\"chart.png\") # plt").is_ok());
    }

    #[test]
    fn test_clean_code_passes_screen() {
        assert!(screen_code("result = df.group_by(\"region\").agg(sum(\"revenue\"))").is_ok());
    }
}
