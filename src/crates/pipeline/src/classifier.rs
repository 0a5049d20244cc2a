//! Modification detection.
//!
//! Splits input text into the regular stream (new temporal facts) and the
//! modification stream (corrections to already-asserted facts). The keyword
//! pass is authoritative unless LLM refinement is enabled; any LLM failure
//! falls back to the keyword result.

use llm::{ChatClient, ChatMessage};

/// Keywords that flag a sentence as a tentative modification.
pub const MODIFICATION_KEYWORDS: [&str; 7] = [
    "actually",
    "in fact",
    "oops",
    "my mistake",
    "update",
    "correction",
    "modification",
];

const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are a text analysis agent that identifies modification sentences in text.
A modification sentence describes a change to an existing fact, a correction, or an update:
- \"Oops, Sally booked the race tickets on the 20th October instead of the 15th\" (corrects a time)
- \"The meeting was on Tuesday, not Monday\" (corrects a time)
- \"My mistake, the location of John's meeting was London\" (corrects a location)

A regular temporal fact sentence states new facts without correcting existing ones:
- \"Sally booked race tickets on October 15th\"
- \"The meeting was on Monday at 2pm\"

Classify each sentence of the input as REGULAR or MODIFICATION and respond in exactly this format:
REGULAR:
[each regular sentence, one per line]

MODIFICATION:
[each modification sentence, one per line]

If there are no modification sentences, return only the REGULAR section.";

/// Split on sentence-terminal periods and route each sentence by keyword.
pub fn keyword_split(text: &str) -> (String, String) {
    let mut regular = Vec::new();
    let mut modifications = Vec::new();

    for sentence in text.split('.').map(str::trim).filter(|s| !s.is_empty()) {
        let lowered = sentence.to_lowercase();
        if MODIFICATION_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            modifications.push(sentence);
        } else {
            regular.push(sentence);
        }
    }

    let regular_text = if regular.is_empty() {
        text.to_string()
    } else {
        regular.join(". ")
    };
    (regular_text, modifications.join(". "))
}

fn parse_llm_sections(response: &str) -> (Vec<String>, Vec<String>) {
    let mut regular = Vec::new();
    let mut modifications = Vec::new();
    let mut section: Option<bool> = None;

    for line in response.lines().map(str::trim) {
        match line {
            "REGULAR:" => section = Some(false),
            "MODIFICATION:" => section = Some(true),
            "" => {}
            _ => match section {
                Some(true) => modifications.push(line.to_string()),
                Some(false) => regular.push(line.to_string()),
                None => {}
            },
        }
    }
    (regular, modifications)
}

/// Classify the text, optionally refining the keyword pass with the LLM.
pub async fn classify(
    client: &ChatClient,
    model: &str,
    text: &str,
    with_llm: bool,
) -> (String, String) {
    let (keyword_regular, keyword_modifications) = keyword_split(text);
    if !with_llm {
        return (keyword_regular, keyword_modifications);
    }

    let messages = vec![
        ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
        ChatMessage::user(format!("Text to analyze:\n{text}")),
    ];
    match client.chat(model, messages, None).await {
        Ok(response) => {
            let (regular, modifications) = parse_llm_sections(&response);
            if regular.is_empty() && modifications.is_empty() {
                (keyword_regular, keyword_modifications)
            } else {
                let regular_text = if regular.is_empty() {
                    text.to_string()
                } else {
                    regular.join("\n")
                };
                (regular_text, modifications.join("\n"))
            }
        }
        Err(error) => {
            tracing::warn!(%error, "LLM classification failed, keeping keyword split");
            (keyword_regular, keyword_modifications)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_pass_routes_modification_sentences() {
        let (regular, modifications) =
            keyword_split("John likes cats. Actually, John likes magazines, not books.");
        assert_eq!(regular, "John likes cats");
        assert_eq!(modifications, "Actually, John likes magazines, not books");
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let (_, modifications) = keyword_split("OOPS, the date was wrong.");
        assert!(modifications.contains("OOPS"));
    }

    #[test]
    fn text_without_modifications_is_all_regular() {
        let (regular, modifications) = keyword_split("Marie Curie won the Nobel Prize in 1903.");
        assert_eq!(regular, "Marie Curie won the Nobel Prize in 1903");
        assert!(modifications.is_empty());
    }

    #[test]
    fn llm_sections_parse() {
        let response = "REGULAR:\nJohn likes cats.\n\nMODIFICATION:\nActually, John likes dogs.";
        let (regular, modifications) = parse_llm_sections(response);
        assert_eq!(regular, vec!["John likes cats."]);
        assert_eq!(modifications, vec!["Actually, John likes dogs."]);
    }

    #[test]
    fn response_without_sections_parses_empty() {
        let (regular, modifications) = parse_llm_sections("no sections at all");
        assert!(regular.is_empty());
        assert!(modifications.is_empty());
    }
}
