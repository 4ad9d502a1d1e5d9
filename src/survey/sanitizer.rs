//! Response sanitizer: keeps generated replies from steering the flow.

use super::classifier::NAVIGATION_CUE;

/// Substituted when stripping leaves nothing to say.
pub const GENERIC_ACKNOWLEDGMENT: &str = "Thank you for sharing that.";

/// Truncate `text` at the earliest navigation cue.
///
/// The result never contains a cue, and applying this twice is the same as
/// applying it once.
pub fn strip_navigation_cues(text: &str) -> String {
    let kept = match NAVIGATION_CUE.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };

    let cleaned = kept
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '—'))
        .trim();

    if cleaned.is_empty() {
        GENERIC_ACKNOWLEDGMENT.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Drop every sentence that ends in a question mark.
///
/// Sentences end at runs of `.`, `!` and `?`; a run containing `?` marks a
/// question. If no sentence survives, the input is returned with all `?`
/// characters removed.
pub fn strip_questions(text: &str) -> String {
    let kept: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|s| !s.contains('?'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if kept.is_empty() {
        text.replace('?', "").trim().to_string()
    } else {
        kept.join(" ")
    }
}

/// Split into sentences, each keeping its terminator run.
///
/// A trailing fragment without a terminator is its own sentence; it cannot
/// contain `?` since any `?` would have closed a sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut in_terminator = false;

    for (i, c) in text.char_indices() {
        let is_terminator = matches!(c, '.' | '!' | '?');
        if in_terminator && !is_terminator {
            sentences.push(&text[start..i]);
            start = i;
        }
        in_terminator = is_terminator;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
