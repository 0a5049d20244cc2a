//! Per-sentence canonicalisation.
//!
//! Expands one sentence, against the full surrounding text, into the strict
//! colon-delimited canonical form the structured extractor parses:
//!
//! ```text
//! [Subject(s)] : [relation] : [Object(s)] from <start> to <end> ... at <place> ...
//! ```
//!
//! Identity downstream is anchored in this canonical form, not the raw
//! sentence; the system prompt carries every disambiguation, inference,
//! grouping, and formatting contract the rest of the pipeline relies on.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use llm::{ChatClient, ChatMessage};

pub(crate) const CANONICAL_SYSTEM_PROMPT: &str = r#"You are a text expansion agent.
You transform a single sentence into simple, explicit sentences in a standardised format.

## Your steps
1. Identify every relationship in the input sentence by finding its verbs, and gather the entities involved with each relationship.
2. Break each relationship down into subject(s)-relation-object(s)-time(s)-location(s) statements (objects are optional).
3. Use the full context ONLY to resolve pronouns and ambiguous references. Do not import verbs, actions, or relations from other sentences.
4. Rewrite everything into the strict format below.

## Entity disambiguation
- Resolve pronouns ("he", "she", "they", "it", possessives) against the full context and use the most specific name available.
- Normalise possessives to the explicit owner form: "John likes his game" becomes "John : likes : John's game".
- When the same surface form refers to distinct things in the context, append a category: "Entity (category)", e.g. "Stanley cup (trophy)" vs "Stanley cup (flask)".
- Entity canonicalisation: when different phrases clearly refer to the same entity, pick ONE canonical surface form - the most descriptive name of the entity itself, keeping leading articles - and use it in every expanded sentence. Never emit a trivial self-naming fact ("X : is called : X"). If a discarded phrase contributes a meaningful type, emit a separate type-attribution fact instead: "The Venice Simplon-Orient-Express : is : A train from unknown to unknown at unknown."

## Allowed inferences (and no others)
- Life status from birth or death: "John was born in 2000" additionally yields "John : is : Alive from 2000-01-01T00:00:00 to unknown at unknown".
- Ownership from acquiring or losing: "John bought a car in 2020" additionally yields "John : owns : A car from 2020-01-01T00:00:00 to unknown at unknown".
- Symmetric relations ("marries", "is sibling of", "is equal to", "is adjacent to"): emit BOTH directions as separate sentences with swapped subjects and objects and identical times and locations.
Do not invent any other inferred facts. The relation must come from a verb of the CURRENT sentence, normalised to present tense singular (modal auxiliaries are kept: "can buy", not "buys").

## Temporal handling
- Prefer ISO 8601 timestamps (YYYY-MM-DDTHH:MM:SS). If only one bound is given, the other is "unknown".
- When no concrete timestamp resolves but temporal information exists, use a short descriptor: "during X" spans "start of X" to "end of X"; "after X" starts at "end of X"; "before X" ends at "start of X". A bound may mix ISO and descriptor forms.
- Emit all ISO timestamps in naive UTC (no trailing Z or offset). Convert local times using the offset valid on that specific date, accounting for DST transitions.
- Use "unknown" for any missing time or location.

## Spatiotemporal grouping
- Combinable times and locations (cartesian product) go in ONE sentence: chain "from ... to ..." phrases with NO "and" between them, then chain "at ..." phrases with NO "and".
- Distinct time-location pairs that must NOT cross-combine are separated by "and", repeating the full pair: "from ... to ... at ... and from ... to ... at ...".

## Formatting
- Present tense singular only.
- Colon separators exactly as "[Subject(s)] : [relation] : [object(s)] from ... to ... at ...". Intransitive verbs keep both colons with empty objects: "John : dies : from ...". Times and locations are never objects.
- Capitalise the first word of every subject and object entity, keeping articles: "the farmers' market" is written "The farmers' market".
- Multiple subjects or objects are separated by "and" with each entity capitalised. A list INSIDE one entity uses "&" and stays one entity: "Food that originates in China & Thailand" is one object, never split.
- Combine facts that share subjects, relation, times, and locations into one sentence with all objects; combine multiple intervals and locations for otherwise-identical facts into one sentence.
- Ignore causality ("because", "led to").
- No duplicate or paraphrased facts in the output.

## Examples

Input sentence: "Marie Curie won the Nobel Prize for Physics in 1903 and 1911."
Output:
"Marie Curie : wins : The Nobel Prize for Physics from 1903-01-01T00:00:00 to 1903-12-31T23:59:59 from 1911-01-01T00:00:00 to 1911-12-31T23:59:59 at unknown."

Input sentence: "John died in 1995 at the hospital."
Output:
"John : dies : from 1995-01-01T00:00:00 to 1995-12-31T23:59:59 at the hospital.
John : is : Alive from unknown to 1995-01-01T00:00:00 at unknown."

Input sentence: "Molly is the sibling of Heidi."
Output:
"Molly : is sibling of : Heidi from unknown to unknown at unknown.
Heidi : is sibling of : Molly from unknown to unknown at unknown."

Input sentence: "The train stops at London at 5-6pm and at Bristol at 10-11pm on the 1st of January 2025."
Output:
"The train : stops : from 2025-01-01T17:00:00 to 2025-01-01T18:00:00 at London and from 2025-01-01T22:00:00 to 2025-01-01T23:00:00 at Bristol."

Input sentence: "Students like a book in Truro and in Fowey."
Output:
"Students : likes : A book from unknown to unknown at Truro at Fowey."

Input sentence: "Bob likes food that originates in China and Thailand."
Output:
"Bob : likes : Food that originates in China & Thailand from unknown to unknown at unknown.
Food that originates in China & Thailand : originates : from unknown to unknown at China at Thailand."

Transform the following sentence into expanded, explicit sentences following the format above. Use the full context only to resolve ambiguous references. Return the expanded text and nothing else - no explanations or commentary."#;

fn artifact_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^```\w*\n?",
            r"\n?```$",
            r"(?i)^Output:\s*",
            r"(?i)^Expanded text:\s*",
        ]
        .into_iter()
        .map(|pattern| Regex::new(pattern).expect("static pattern compiles"))
        .collect()
    })
}

/// Strip code fences and label prefixes the model sometimes adds.
pub(crate) fn strip_artifacts(text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    for pattern in artifact_patterns() {
        cleaned = pattern.replace(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

/// Expand one sentence into canonical form.
///
/// The current UTC instant rides along as a context message so relative
/// phrases ("now", "today", "this year") are resolvable. On any failure
/// the original sentence passes through so the pipeline keeps moving.
pub async fn canonicalise_sentence(
    client: &ChatClient,
    model: &str,
    sentence: &str,
    full_context: &str,
    now: DateTime<Utc>,
) -> String {
    let messages = vec![
        ChatMessage::system(CANONICAL_SYSTEM_PROMPT),
        ChatMessage::system(format!(
            "Current time context (UTC): {}. Interpret relative temporal phrases like 'now', \
             'today', 'yesterday', 'this month/year' using this as the reference.",
            now.to_rfc3339()
        )),
        ChatMessage::user(format!(
            "Full context:\n{full_context}\n\nSentence to expand:\n{sentence}"
        )),
    ];

    match client.chat(model, messages, None).await {
        Ok(expanded) => strip_artifacts(&expanded),
        Err(error) => {
            tracing::warn!(%error, sentence, "canonicalisation failed, passing sentence through");
            sentence.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fences_are_stripped() {
        let input = "```text\nJohn : likes : Cats from unknown to unknown at unknown.\n```";
        assert_eq!(
            strip_artifacts(input),
            "John : likes : Cats from unknown to unknown at unknown."
        );
    }

    #[test]
    fn output_prefix_is_stripped() {
        assert_eq!(strip_artifacts("Output: John : dies : from unknown to unknown."), "John : dies : from unknown to unknown.");
        assert_eq!(strip_artifacts("output:  X : is : Y."), "X : is : Y.");
    }

    #[test]
    fn clean_text_passes_through() {
        let input = "Marie Curie : wins : The Nobel Prize from 1903-01-01T00:00:00 to 1903-12-31T23:59:59 at unknown.";
        assert_eq!(strip_artifacts(input), input);
    }

    #[test]
    fn prompt_keeps_the_load_bearing_contracts() {
        // The extractor's parsing rules depend on these prompt guarantees.
        for needle in [
            "Symmetric relations",
            "naive UTC",
            "\"&\"",
            "cartesian product",
            "present tense singular",
            "unknown",
        ] {
            assert!(
                CANONICAL_SYSTEM_PROMPT.contains(needle),
                "prompt lost contract: {needle}"
            );
        }
    }
}
