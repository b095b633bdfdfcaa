//! Topic Classifier
//!
//! Decides whether a piece of text belongs to the music domain and which
//! pillars it touches. Matching is done on normalized word sequences: a
//! registered phrase matches only where all of its words appear contiguously
//! and in order. A small base vocabulary keeps the classifier useful even when
//! no pillar loaded.

use crate::registry::Registry;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Generic domain words that are always available.
const BASE_VOCABULARY: &[&str] = &[
    "music",
    "musical",
    "musician",
    "song",
    "songwriting",
    "chord",
    "chords",
    "scale",
    "melody",
    "melodic",
    "harmony",
    "harmonic",
    "rhythm",
    "rhythmic",
    "tempo",
    "instrument",
    "composition",
    "composer",
    "guitar",
    "piano",
    "drums",
    "violin",
    "saxophone",
    "jazz",
    "blues",
    "nashville",
    "chord progression",
    "music theory",
    "sheet music",
    "time signature",
    "key signature",
];

/// Chord symbols such as `F#maj7`, `Bbm7`, `Cdim` or `Gsus4`. Case sensitive.
static CHORD_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-G][#b]?(?:maj7|maj9|m7b5|m7|m9|min7|dim7|dim|aug|sus2|sus4|add9|7|9|13)(?:\b|$)")
        .expect("valid regex")
});

/// Nashville chart symbols: `6m`, `5sus4`, `b7`, `7°`.
static NASHVILLE_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[1-7]m|[1-7]sus[24]|b[1-7])\b|\b[1-7]°").expect("valid regex")
});

/// Bare minor triads such as `Dm`, `F#m` or `Bbm`.
static MINOR_TRIAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-G][#b]?m\b").expect("valid regex"));

static BASE_PHRASES: LazyLock<Vec<Vec<String>>> =
    LazyLock::new(|| BASE_VOCABULARY.iter().map(|term| words(term)).collect());

/// Outcome of classifying one input. Produced fresh per input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub is_in_domain: bool,
    /// Matched pillar names, in registration order.
    pub matched_pillars: Vec<String>,
    /// Matched phrases, in scan order, without duplicates.
    pub matched_terms: Vec<String>,
    /// Whether the base vocabulary (or chord-symbol heuristic) matched.
    pub base_vocabulary_hit: bool,
}

impl ClassificationResult {
    pub fn matched(&self, pillar: &str) -> bool {
        self.matched_pillars.iter().any(|p| p == pillar)
    }
}

/// Splits text into lower-cased words, trimming punctuation at word edges.
///
/// Inner punctuation is kept so that phrases like `ii-v-i`, `4/4` or `r&b`
/// survive, and a trailing `#` is kept for note names such as `c#`.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_start_matches(|c: char| !c.is_alphanumeric())
                .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '#' && c != '°')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn word_matches(word: &str, term: &str) -> bool {
    word == term || word.strip_suffix('s') == Some(term) || word.strip_suffix("es") == Some(term)
}

/// True if `phrase` occurs in `input` as a contiguous word sequence. The final
/// word of the phrase also accepts a simple plural.
fn contains_phrase(input: &[String], phrase: &[String]) -> bool {
    let Some((last, head)) = phrase.split_last() else {
        return false;
    };
    input.len() >= phrase.len()
        && input.windows(phrase.len()).any(|window| {
            window[..head.len()] == *head && word_matches(&window[head.len()], last)
        })
}

/// A sentence-initial `Am` is the verb ("Am I late?"), not A minor.
fn has_minor_triad(text: &str) -> bool {
    MINOR_TRIAD.find_iter(text).any(|found| {
        let before = text[..found.start()].trim_end();
        let starts_sentence = before.is_empty() || before.ends_with(['.', '!', '?']);
        !(found.as_str() == "Am" && starts_sentence)
    })
}

/// Classifies `text` against the available pillars of `registry`.
///
/// Pure: it never mutates the registry and has no failure mode.
pub fn classify(registry: &Registry, text: &str) -> ClassificationResult {
    let input = words(text);
    if input.is_empty() {
        return ClassificationResult::default();
    }

    let mut result = ClassificationResult::default();
    let mut seen_terms = HashSet::new();

    for pillar in registry.available_pillars() {
        let mut pillar_matched = false;
        for term in pillar.terms() {
            if contains_phrase(&input, term.words()) {
                pillar_matched = true;
                if seen_terms.insert(term.phrase.as_str()) {
                    result.matched_terms.push(term.phrase.clone());
                }
            }
        }
        if pillar_matched {
            result.matched_pillars.push(pillar.name.clone());
        }
    }

    result.base_vocabulary_hit = BASE_PHRASES
        .iter()
        .any(|phrase| contains_phrase(&input, phrase))
        || CHORD_SYMBOL.is_match(text)
        || NASHVILLE_SYMBOL.is_match(text)
        || has_minor_triad(text);
    result.is_in_domain = !result.matched_pillars.is_empty() || result.base_vocabulary_hit;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PillarSource;

    fn registry() -> Registry {
        Registry::load([
            PillarSource::inline("notation-system", ["nashville number", "ii-v-i"]),
            PillarSource::inline("theory-curriculum", ["circle of fifths", "cadence"]),
            PillarSource::inline("performance-technique", ["capo technique", "vibrato"]),
        ])
    }

    #[test]
    fn test_words_normalizes_case_and_edge_punctuation() {
        assert_eq!(
            words("  What is the Nashville number, for a ii-V-I?  "),
            vec!["what", "is", "the", "nashville", "number", "for", "a", "ii-v-i"]
        );
        assert_eq!(words("(C#) 4/4!"), vec!["c#", "4/4"]);
        assert!(words(" ?! ... ").is_empty());
    }

    #[test]
    fn test_nashville_question_matches_notation_pillar() {
        let result = classify(&registry(), "What is the nashville number for a ii-V-I?");
        assert!(result.is_in_domain);
        assert_eq!(result.matched_pillars, vec!["notation-system"]);
        assert_eq!(result.matched_terms, vec!["nashville number", "ii-v-i"]);
    }

    #[test]
    fn test_empty_and_punctuation_only_input_is_out_of_domain() {
        let registry = registry();
        assert_eq!(classify(&registry, ""), ClassificationResult::default());
        assert_eq!(classify(&registry, "  ?!.,  "), ClassificationResult::default());
    }

    #[test]
    fn test_unrelated_input_is_out_of_domain() {
        let result = classify(&registry(), "What's 2+2?");
        assert!(!result.is_in_domain);
        assert!(result.matched_pillars.is_empty());
        assert!(!result.base_vocabulary_hit);
    }

    #[test]
    fn test_multi_word_phrase_requires_contiguous_sequence() {
        let registry = registry();
        assert!(classify(&registry, "explain the circle of fifths").matched("theory-curriculum"));
        assert!(!classify(&registry, "a circle made of fifths").matched("theory-curriculum"));
        assert!(!classify(&registry, "how do I use a capo").is_in_domain);
    }

    #[test]
    fn test_separate_single_words_do_not_form_phrase() {
        let registry = Registry::load([PillarSource::inline("theory", ["circle", "fifths"])]);
        let result = classify(&registry, "explain the circle of fifths");
        assert_eq!(result.matched_terms, vec!["circle", "fifths"]);
        assert!(!result.matched_terms.iter().any(|t| t == "circle of fifths"));
    }

    #[test]
    fn test_whole_words_only() {
        let registry = Registry::load([PillarSource::inline("theory", ["key"])]);
        assert!(!classify(&registry, "the monkey escaped").is_in_domain);
        assert!(classify(&registry, "what key is this in?").is_in_domain);
    }

    #[test]
    fn test_plural_of_final_word() {
        let registry = Registry::load([PillarSource::inline("notation", ["chord progression"])]);
        assert!(classify(&registry, "show me some chord progressions").matched("notation"));
        assert!(!classify(&registry, "chords progression").matched("notation"));
    }

    #[test]
    fn test_order_follows_registration_not_discovery() {
        let result = classify(
            &registry(),
            "Add vibrato after the cadence, then a ii-V-I and the nashville number",
        );
        assert_eq!(
            result.matched_pillars,
            vec!["notation-system", "theory-curriculum", "performance-technique"]
        );
        assert_eq!(
            result.matched_terms,
            vec!["nashville number", "ii-v-i", "cadence", "vibrato"]
        );
    }

    #[test]
    fn test_duplicate_terms_across_pillars_reported_once() {
        let registry = Registry::load([
            PillarSource::inline("performance", ["vibrato"]),
            PillarSource::inline("strings", ["vibrato", "bowing"]),
        ]);
        let result = classify(&registry, "vibrato on a violin");
        assert_eq!(result.matched_pillars, vec!["performance", "strings"]);
        assert_eq!(result.matched_terms, vec!["vibrato"]);
    }

    #[test]
    fn test_base_vocabulary_works_without_pillars() {
        let empty = Registry::load(Vec::<PillarSource>::new());
        let result = classify(&empty, "Can you recommend a jazz song?");
        assert!(result.is_in_domain);
        assert!(result.base_vocabulary_hit);
        assert!(result.matched_pillars.is_empty());
    }

    #[test]
    fn test_unavailable_pillars_are_skipped() {
        let registry = Registry::load([PillarSource::inline("hollow", ["   "])]);
        assert!(!classify(&registry, "hollow words").is_in_domain);
    }

    #[test]
    fn test_chord_symbol_heuristic() {
        let empty = Registry::default();
        assert!(classify(&empty, "how do I voice F#maj7 then Bbm7?").is_in_domain);
        assert!(classify(&empty, "Gsus4 to G").is_in_domain);
        assert!(!classify(&empty, "Am I late? Be there at 7").is_in_domain);
    }

    #[test]
    fn test_nashville_symbols() {
        let registry = Registry::builtin();
        assert!(classify(&registry, "What does b7 mean in a chart?").is_in_domain);
        assert!(classify(&registry, "Is 6m to 5sus4 a good move?").is_in_domain);
        assert!(classify(&registry, "Is 5sus2 common?").is_in_domain);
        assert!(classify(&registry, "Where does the 7° go?").is_in_domain);
        assert!(classify(&registry, "Try 2m here").base_vocabulary_hit);
        assert!(!classify(&registry, "What's 2+2?").is_in_domain);
        assert!(!classify(&registry, "Is 3/4 bigger than 1/2?").base_vocabulary_hit);
    }

    #[test]
    fn test_minor_triads() {
        let registry = Registry::builtin();
        assert!(classify(&registry, "Should I go from Dm to F#m?").is_in_domain);
        assert!(classify(&registry, "Is Bbm sad?").is_in_domain);
        assert!(classify(&registry, "Why Am after C?").is_in_domain);
        assert!(classify(&registry, "Play C, Am then G?").is_in_domain);
        assert!(!classify(&registry, "Am I late?").is_in_domain);
        assert!(!classify(&registry, "What's 2+2?").is_in_domain);
    }
}
