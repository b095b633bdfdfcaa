//! Context Enricher
//!
//! Turns a classification into the instruction block sent along with the
//! user's message. Matched pillars contribute a short elaboration taken from a
//! static table (never the raw term list); out-of-domain input gets a fixed
//! refusal-steering instruction instead.

use crate::{classifier::ClassificationResult, registry::Registry};
use std::collections::HashMap;

/// Base instructions used when no system prompt file is provided.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert music instructor. \
Give practical, accurate and encouraging answers about music theory, chord \
progressions and the Nashville number system, instruments and production, and \
performance technique. When discussing chord progressions, show both the chord \
names and their Nashville numbers. Adapt the depth of the answer to the \
student's apparent level, and say so when you do not know something.";

/// The sentence a decline should open with.
pub const DECLINE_MESSAGE: &str =
    "I'm sorry, I can only help with music-related questions or concepts.";

const CONCISE_INSTRUCTION: &str = "Keep the answer brief and direct.";

const PILLAR_ELABORATIONS: &[(&str, &str)] = &[
    (
        "notation-system",
        "Use the Nashville number system: number chords by scale degree (1-7, \
         minor chords marked with m, e.g. 1 - 6m - 4 - 5), show the chord names \
         alongside the numbers, and explain how the numbers make transposition \
         and band communication easy.",
    ),
    (
        "instrument-production",
        "Refer to the relevant instrument family and its sound, mention MIDI \
         program or synthesis details where useful, and give concrete recording, \
         mixing or sound-design advice.",
    ),
    (
        "theory-curriculum",
        "Explain the theory step by step with correct terminology (scale \
         degrees, intervals, chord qualities, functions), and build from the \
         fundamentals toward the concept asked about.",
    ),
    (
        "performance-technique",
        "Focus on playable technique: fingerings, voicings, practice routines, \
         ear-training exercises and live-performance habits, with a short \
         practice suggestion the student can try today.",
    ),
];

/// Builds augmented instructions from a classification.
#[derive(Debug, Clone)]
pub struct ContextEnricher {
    elaborations: HashMap<String, String>,
    capabilities: String,
    concise: bool,
}

impl ContextEnricher {
    /// Prepares elaborations for every pillar in `registry`.
    ///
    /// Pillars without a static entry fall back to their description.
    pub fn new(registry: &Registry) -> Self {
        let elaborations = registry
            .pillars()
            .iter()
            .map(|pillar| {
                let text = PILLAR_ELABORATIONS
                    .iter()
                    .find(|(name, _)| *name == pillar.name)
                    .map(|(_, text)| text.to_string())
                    .unwrap_or_else(|| {
                        let topic = pillar
                            .description
                            .clone()
                            .unwrap_or_else(|| pillar.name.replace('-', " "));
                        format!("Draw on your knowledge of {topic} where relevant.")
                    });
                (pillar.name.clone(), text)
            })
            .collect();

        Self {
            elaborations,
            capabilities: registry.capabilities(),
            concise: false,
        }
    }

    pub fn with_concise(mut self, concise: bool) -> Self {
        self.concise = concise;
        self
    }

    pub fn capabilities(&self) -> &str {
        &self.capabilities
    }

    /// The fixed instruction used for out-of-domain input.
    pub fn refusal_instructions(&self) -> String {
        format!(
            "You are a music tutor and only discuss music. The user's message is \
             not about music. Do not answer it. Reply with one or two short \
             sentences: begin with \"{DECLINE_MESSAGE}\", mention that you \
             specialize in {}, and invite a music question.",
            self.capabilities
        )
    }

    /// Produces the instructions for one request.
    ///
    /// Elaborations are appended in pillar registration order, which is the
    /// order of `classification.matched_pillars`.
    pub fn enrich(&self, base_instructions: &str, classification: &ClassificationResult) -> String {
        if !classification.is_in_domain {
            return self.refusal_instructions();
        }

        let mut instructions = base_instructions.trim_end().to_string();

        let elaborations: Vec<String> = classification
            .matched_pillars
            .iter()
            .filter_map(|name| {
                self.elaborations
                    .get(name)
                    .map(|text| format!("- {}: {}", name.replace('-', " "), text))
            })
            .collect();

        if !elaborations.is_empty() {
            instructions.push_str("\n\n# Context for This Question\n\n");
            instructions.push_str("The question touches these areas:\n");
            instructions.push_str(&elaborations.join("\n"));
        }

        if self.concise {
            instructions.push_str("\n\n");
            instructions.push_str(CONCISE_INSTRUCTION);
        }

        instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::registry::{PillarData, PillarSource};

    fn registry() -> Registry {
        Registry::load([
            PillarSource::inline("notation-system", ["nashville number"]),
            PillarSource::inline("performance-technique", ["capo technique"]),
            PillarSource::Inline(PillarData {
                name: "songwriting".to_string(),
                description: Some("lyric writing and song form".to_string()),
                terms: vec!["chorus hook".to_string()],
            }),
        ])
    }

    #[test]
    fn test_out_of_domain_gets_refusal_instructions() {
        let registry = registry();
        let enricher = ContextEnricher::new(&registry);
        let classification = classify(&registry, "What's 2+2?");

        let instructions = enricher.enrich("BASE", &classification);
        assert!(!instructions.contains("BASE"));
        assert!(instructions.contains(DECLINE_MESSAGE));
        assert!(instructions.contains("general music fundamentals"));
    }

    #[test]
    fn test_matched_pillar_elaboration_appended() {
        let registry = registry();
        let enricher = ContextEnricher::new(&registry);
        let classification = classify(&registry, "What is the nashville number for a ii-V-I?");

        let instructions = enricher.enrich("BASE", &classification);
        assert!(instructions.starts_with("BASE\n\n# Context for This Question"));
        assert!(instructions.contains("- notation system: Use the Nashville number system"));
        assert!(!instructions.contains("performance technique:"));
        // The raw term list is never injected.
        assert!(!instructions.contains("nashville number,"));
    }

    #[test]
    fn test_elaborations_follow_registration_order() {
        let registry = registry();
        let enricher = ContextEnricher::new(&registry);
        let classification = classify(
            &registry,
            "Write a chorus hook using capo technique and a nashville number chart",
        );

        let instructions = enricher.enrich("BASE", &classification);
        let notation = instructions.find("- notation system").unwrap();
        let performance = instructions.find("- performance technique").unwrap();
        let songwriting = instructions
            .find("- songwriting: Draw on your knowledge of lyric writing and song form")
            .unwrap();
        assert!(notation < performance && performance < songwriting);
    }

    #[test]
    fn test_base_vocabulary_only_keeps_base_instructions() {
        let registry = registry();
        let enricher = ContextEnricher::new(&registry);
        let classification = classify(&registry, "Recommend a jazz song");

        assert!(classification.is_in_domain);
        assert_eq!(enricher.enrich("BASE\n", &classification), "BASE");
    }

    #[test]
    fn test_concise_adds_brevity_line() {
        let registry = registry();
        let enricher = ContextEnricher::new(&registry).with_concise(true);
        let classification = classify(&registry, "Recommend a jazz song");

        assert_eq!(
            enricher.enrich("BASE", &classification),
            format!("BASE\n\n{CONCISE_INSTRUCTION}")
        );
    }
}
