//! Best-effort removal of lightweight markdown from model output.
//!
//! This is display cleanup, not a parser: stages run in a fixed order and
//! malformed or nested markup is left however the patterns leave it.

use once_cell::sync::Lazy;
use regex::Regex;

struct Stage {
    pattern: Regex,
    replacement: &'static str,
}

fn stage(pattern: &str, replacement: &'static str) -> Stage {
    Stage {
        pattern: Regex::new(pattern).expect("valid markdown pattern"),
        replacement,
    }
}

// Bold must run before italics so `**x**` is not read as two italic spans.
static STAGES: Lazy<[Stage; 7]> = Lazy::new(|| {
    [
        stage(r"\*\*(.*?)\*\*", "${1}"),
        stage(r"\*(.*?)\*", "${1}"),
        stage(r"(?m)^#{1,6}\s+", ""),
        stage(r"```[\s\S]*?```", ""),
        stage(r"`([^`]+)`", "${1}"),
        stage(r"\[([^\]]+)\]\([^)]+\)", "${1}"),
        stage(r"\n\s*\n", "\n"),
    ]
});

/// Strip bold, italics, headings, code fences, inline code and links, collapse
/// blank lines and trim.
pub fn strip(text: &str) -> String {
    let mut out = text.to_string();
    for s in STAGES.iter() {
        if let std::borrow::Cow::Owned(replaced) = s.pattern.replace_all(&out, s.replacement) {
            out = replaced;
        }
    }
    out.trim().to_string()
}
