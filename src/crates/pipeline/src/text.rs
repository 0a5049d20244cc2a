//! Text cleanup, sentence segmentation, and chunking.

use std::sync::OnceLock;

use regex::Regex;

/// Minimum sentence length; shorter fragments are artifacts of splitting.
const MIN_SENTENCE_LEN: usize = 4;

fn cleanup_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Wikipedia-style citation markers.
            (r"\[\d+\]", ""),
            // Combining diacritical marks.
            (r"[\u{0300}-\u{036F}]", ""),
            // Spacing modifier letters (stress and length marks) and IPA.
            (r"[\u{02B0}-\u{02FF}]", ""),
            (r"[\u{0250}-\u{02AF}]", ""),
            // Superscript and subscript digits.
            (r"[\u{2070}-\u{209F}\u{00B9}\u{00B2}\u{00B3}]", ""),
            // Circled letters such as the Wikipedia audio marker.
            (r"[\u{24B6}-\u{24E9}\u{24EA}]", ""),
            // Control characters, keeping newlines and carriage returns.
            (r"[\u{0000}-\u{0009}\u{000B}-\u{001F}\u{007F}-\u{009F}]", ""),
            // Stray brackets that would produce malformed sentences.
            (r"\s+[\[\]{}]\s+", " "),
            (r"^\s*[\[\]{}]\s*", ""),
            (r"\s*[\[\]{}]\s*$", ""),
            // Collapse runs of whitespace.
            (r"\s+", " "),
        ]
        .into_iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("static pattern compiles"),
                replacement,
            )
        })
        .collect()
    })
}

/// Strip citations, diacritics, pronunciation symbols, and control
/// characters that confuse the downstream models.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (pattern, replacement) in cleanup_patterns() {
        cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
    }
    cleaned.trim().to_string()
}

/// Split on sentence-terminal punctuation followed by whitespace,
/// discarding fragments too short to be sentences.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if trimmed.len() >= MIN_SENTENCE_LEN {
        sentences.push(trimmed.to_string());
    }
}

/// Group sentences into `(chunk_index, chunk_text)` pairs of `chunk_size`
/// sentences each.
pub fn split_text_into_chunks(text: &str, chunk_size: usize) -> Vec<(usize, String)> {
    let chunk_size = chunk_size.max(1);
    split_into_sentences(text)
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, sentences)| (index, sentences.join(" ")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citations_and_diacritics_are_stripped() {
        let input = "Bjarne Stroustrup (/ˈbjɑːrnə/ ⓘ; born 1950)[3][4] is a computer scientist.[5]";
        let cleaned = clean_text(input);
        assert!(!cleaned.contains("[3]"));
        assert!(!cleaned.contains('ˈ'));
        assert!(!cleaned.contains('ⓘ'));
        assert!(cleaned.contains("born 1950"));
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(clean_text("a   b\t\tc"), "a b c");
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let sentences = split_into_sentences("John likes cats. Mary likes dogs! Who knew?");
        assert_eq!(
            sentences,
            vec!["John likes cats.", "Mary likes dogs!", "Who knew?"]
        );
    }

    #[test]
    fn abbreviation_like_fragments_are_dropped() {
        let sentences = split_into_sentences("Hi. This is a real sentence.");
        assert_eq!(sentences, vec!["This is a real sentence."]);
    }

    #[test]
    fn decimal_points_do_not_split() {
        let sentences = split_into_sentences("The value rose by 3.5 percent in 2020.");
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn chunks_group_sentences_with_indices() {
        let text = "One sentence here. Two sentences here. Three sentences here. Four here.";
        let chunks = split_text_into_chunks(text, 3);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].0, 0);
        assert!(chunks[0].1.contains("Three sentences here."));
        assert_eq!(chunks[1].1, "Four here.");
    }
}
