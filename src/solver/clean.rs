//! Response cleaning
//!
//! Turns a raw model reply into the short answer shown to the user.

use lazy_regex::lazy_regex;

/// Match a reasoning block, including its contents
static RE_THINK_BLOCK: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?s)<think>.*?</think>");

/// Match a line that starts with the answer label, up to the end of that line
static RE_ANSWER_LINE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?im)^[^\S\n]*(correct answer:[^\n]*)");

/// Strip reasoning blocks and reduce a model reply to its answer.
///
/// Reasoning blocks are removed until none remain, so markers that only
/// line up after a removal are stripped too. If a line starts with
/// `Correct Answer:` (any case) the result is that line from the label on;
/// otherwise it is the remaining text. The result is always trimmed.
///
/// # Examples
///
/// ```
/// use mcq_solver_bot::solver::clean_response;
///
/// let raw = "<think>\n2 + 2 is 4\n</think>\nCorrect Answer: b)4";
/// assert_eq!(clean_response(raw), "Correct Answer: b)4");
/// assert_eq!(clean_response("  a)19 \n"), "a)19");
/// ```
#[must_use]
pub fn clean_response(text: &str) -> String {
    let mut cleaned = text.to_string();
    while RE_THINK_BLOCK.is_match(&cleaned) {
        cleaned = RE_THINK_BLOCK.replace_all(&cleaned, "").into_owned();
    }

    RE_ANSWER_LINE
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| cleaned.trim(), |m| m.as_str().trim())
        .to_string()
}
