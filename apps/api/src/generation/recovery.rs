//! Response recovery pipeline: extracts usable flashcard pairs from an
//! unreliable model response.
//!
//! Providers frequently ignore the strict JSON schema they were asked for,
//! so recovery degrades through a fixed priority order instead of failing
//! the whole generation. Each strategy is a pure function
//! `&str -> Option<Vec<(front, back)>>`; the first one yielding at least one
//! pair wins:
//!
//! 1. direct field match on a parsed JSON object (`flashcards`, or the
//!    singular `flashcard` quirk some providers emit),
//! 2. fenced markdown code blocks re-parsed as JSON,
//! 3. free-text pattern mining over labeled question/answer conventions,
//! 4. a last-resort question-mark heuristic.
//!
//! Exhausting all four is a terminal `Parsing` error carrying a snippet of
//! the original content for diagnosability.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::ai_client::AiError;
use crate::models::generation::FlashcardProposal;

/// Max length of the raw-content snippet embedded in a `Parsing` error.
const SNIPPET_MAX_CHARS: usize = 200;

type Pair = (String, String);

/// Runs the full recovery pipeline over raw message content.
/// Every recovered pair receives a fresh opaque id.
pub fn recover_proposals(content: &str) -> Result<Vec<FlashcardProposal>, AiError> {
    let pairs = direct_fields_from_text(content)
        .or_else(|| code_blocks(content))
        .or_else(|| pattern_mining(content))
        .or_else(|| question_heuristic(content))
        .ok_or_else(|| AiError::Parsing(snippet(content)))?;

    Ok(pairs
        .into_iter()
        .map(|(front, back)| FlashcardProposal {
            id: Uuid::new_v4().to_string(),
            front,
            back,
        })
        .collect())
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 1: direct field match
// ────────────────────────────────────────────────────────────────────────────

fn direct_fields_from_text(content: &str) -> Option<Vec<Pair>> {
    let value: Value = serde_json::from_str(content.trim()).ok()?;
    direct_fields(&value)
}

/// Looks up a `flashcards` array (tolerantly also the singular `flashcard`)
/// and maps each element's `front`/`back` strings.
fn direct_fields(value: &Value) -> Option<Vec<Pair>> {
    let items = value
        .get("flashcards")
        .and_then(Value::as_array)
        .or_else(|| value.get("flashcard").and_then(Value::as_array))?;

    let pairs: Vec<Pair> = items
        .iter()
        .filter_map(|item| {
            let front = item.get("front").and_then(Value::as_str)?;
            let back = item.get("back").and_then(Value::as_str)?;
            Some((
                strip_wrapping_quotes(front).to_string(),
                strip_wrapping_quotes(back).to_string(),
            ))
        })
        .collect();

    non_empty(pairs)
}

/// Strips one layer of wrapping single or double quotes. Applied exactly
/// once, never recursively.
fn strip_wrapping_quotes(s: &str) -> &str {
    let s = s.trim();
    let bytes = s.as_bytes();
    if s.len() >= 2
        && ((bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\''))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 2: markdown code-block extraction
// ────────────────────────────────────────────────────────────────────────────

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex"));

/// Scans fenced code blocks (optionally tagged `json`), JSON-parses each and
/// re-applies the direct field lookup.
fn code_blocks(text: &str) -> Option<Vec<Pair>> {
    let mut pairs = Vec::new();
    for cap in CODE_BLOCK.captures_iter(text) {
        if let Ok(value) = serde_json::from_str::<Value>(cap[1].trim()) {
            if let Some(mut found) = direct_fields(&value) {
                pairs.append(&mut found);
            }
        }
    }
    non_empty(pairs)
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 3: free-text pattern mining
// ────────────────────────────────────────────────────────────────────────────

/// Ordered label conventions observed in free-text model output. Matches
/// accumulate across all patterns; a pattern matching zero times contributes
/// nothing.
static MINING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "Pytanie: ...\nOdpowiedź: ..." (the prompt asks for Polish output)
        r"(?im)^\s*Pytanie:\s*(.+?)\s*\n\s*Odpowied[źz]:\s*(.+?)\s*$",
        // "Front: ...\nBack: ..."
        r"(?im)^\s*Front:\s*(.+?)\s*\n\s*Back:\s*(.+?)\s*$",
        // Numbered list: "1. Question?\nAnswer"
        r"(?m)^\s*\d+[.)]\s*(.+\?)\s*\n\s*(.+?)\s*$",
        // Inline "Q: ... A: ..." on a single line
        r"(?im)^\s*Q:\s*(.+?)\s+A:\s*(.+?)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

fn pattern_mining(text: &str) -> Option<Vec<Pair>> {
    let mut pairs = Vec::new();
    for pattern in MINING_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            pairs.push((cap[1].trim().to_string(), cap[2].trim().to_string()));
        }
    }
    non_empty(pairs)
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy 4: question-mark heuristic (low confidence)
// ────────────────────────────────────────────────────────────────────────────

/// Treats lines ending in `?` as candidate questions and the text that
/// follows as the candidate answer, stopping at a blank line, the next
/// question, or a heading-like line.
fn question_heuristic(text: &str) -> Option<Vec<Pair>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        if !line.is_empty() && line.ends_with('?') {
            let mut answer_lines = Vec::new();
            let mut j = i + 1;
            while j < lines.len() {
                let next = lines[j].trim();
                if next.is_empty() || next.ends_with('?') || looks_like_heading(next) {
                    break;
                }
                answer_lines.push(next);
                j += 1;
            }
            if !answer_lines.is_empty() {
                pairs.push((line.to_string(), answer_lines.join(" ")));
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }

    non_empty(pairs)
}

/// A capitalized line without terminal sentence punctuation, or one ending
/// in a colon, reads as a new heading rather than answer continuation.
fn looks_like_heading(line: &str) -> bool {
    let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
    starts_upper
        && (line.ends_with(':')
            || (line.split_whitespace().count() <= 3 && !line.ends_with('.') && !line.ends_with('!')))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn non_empty(pairs: Vec<Pair>) -> Option<Vec<Pair>> {
    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

/// Char-boundary-safe truncation of the raw content for error messages.
fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_match_returns_the_pair_with_fresh_id() {
        let content = r#"{"flashcards":[{"front":"Q","back":"A"}]}"#;
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].front, "Q");
        assert_eq!(proposals[0].back, "A");
        assert!(Uuid::parse_str(&proposals[0].id).is_ok());
    }

    #[test]
    fn singular_flashcard_key_is_tolerated() {
        let content = r#"{"flashcard":[{"front":"Q","back":"A"}]}"#;
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].front, "Q");
        assert_eq!(proposals[0].back, "A");
    }

    #[test]
    fn each_proposal_gets_a_distinct_id() {
        let content = r#"{"flashcards":[
            {"front":"Q1","back":"A1"},
            {"front":"Q2","back":"A2"}
        ]}"#;
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 2);
        assert_ne!(proposals[0].id, proposals[1].id);
    }

    #[test]
    fn code_block_fallback_recovers_from_text() {
        let content = "Oto fiszki:\n```json\n{\"flashcards\":[{\"front\":\"Q\",\"back\":\"A\"}]}\n```\nPowodzenia!";
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].front, "Q");
        assert_eq!(proposals[0].back, "A");
    }

    #[test]
    fn untagged_code_block_also_works() {
        let content = "```\n{\"flashcard\":[{\"front\":\"Q\",\"back\":\"A\"}]}\n```";
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
    }

    #[test]
    fn regex_fallback_mines_labeled_pairs() {
        let content = "Pytanie: Co to jest X?\nOdpowiedź: X to Y.";
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].front, "Co to jest X?");
        assert_eq!(proposals[0].back, "X to Y.");
    }

    #[test]
    fn multiple_patterns_accumulate() {
        let content = "Pytanie: Co to jest X?\nOdpowiedź: X to Y.\n\nFront: What is Z?\nBack: Z is W.";
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].front, "Co to jest X?");
        assert_eq!(proposals[1].front, "What is Z?");
    }

    #[test]
    fn numbered_list_pattern_fires() {
        let content = "1. Co oznacza HTTP?\nHypertext Transfer Protocol to protokół przesyłania dokumentów.";
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals[0].front, "Co oznacza HTTP?");
    }

    #[test]
    fn question_heuristic_is_the_last_resort() {
        let content = "Jak działa pamięć podręczna?\nprzechowuje wyniki ostatnich obliczeń w szybkim magazynie.";
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].front, "Jak działa pamięć podręczna?");
        assert!(proposals[0].back.starts_with("przechowuje"));
    }

    #[test]
    fn empty_content_exhausts_all_strategies() {
        match recover_proposals("") {
            Err(AiError::Parsing(snippet)) => assert!(snippet.is_empty()),
            other => panic!("expected Parsing error, got {other:?}"),
        }
    }

    #[test]
    fn unstructured_prose_without_questions_fails() {
        let content = "To jest zwykły opis bez żadnej struktury. Nic tu nie ma.";
        assert!(matches!(
            recover_proposals(content),
            Err(AiError::Parsing(_))
        ));
    }

    #[test]
    fn parsing_error_snippet_is_truncated_on_char_boundary() {
        // Multi-byte characters with no recoverable structure.
        let content = "ż".repeat(500);
        match recover_proposals(&content) {
            Err(AiError::Parsing(snippet)) => {
                assert_eq!(snippet.chars().count(), 200);
            }
            other => panic!("expected Parsing error, got {other:?}"),
        }
    }

    #[test]
    fn wrapping_quotes_are_stripped_exactly_once() {
        let content = r#"{"flashcards":[{"front":"\"Hello\"","back":"'World'"}]}"#;
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals[0].front, "Hello");
        assert_eq!(proposals[0].back, "World");
    }

    #[test]
    fn double_wrapped_quotes_lose_only_the_outer_layer() {
        let content = r#"{"flashcards":[{"front":"\"\"Hello\"\"","back":"A"}]}"#;
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals[0].front, "\"Hello\"");
    }

    #[test]
    fn direct_match_entries_missing_fields_are_skipped() {
        let content = r#"{"flashcards":[{"front":"Q"},{"front":"Q2","back":"A2"}]}"#;
        let proposals = recover_proposals(content).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].front, "Q2");
    }
}
