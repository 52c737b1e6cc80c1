//! Wake phrase matching
//!
//! Checks finalized transcripts for a trigger phrase. Speech recognizers
//! routinely mishear an invented name like "neptr", so matching runs in two
//! passes:
//!
//! 1. exact: any configured trigger phrase is contained in the transcript
//! 2. fuzzy: a lead word ("hello", "hey", "hi") and a phonetic variant of the
//!    name ("nectar", "after", ...) both appear as whole tokens
//!
//! A lead word alone never triggers, and lead words only match whole tokens
//! so "hide" does not count as "hi".

use crate::{Error, Result};

/// Where in a transcript the wake phrase ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    /// The trigger or variant that matched
    pub phrase: String,
    /// Whatever was said after the wake phrase, possibly empty
    pub remainder: String,
}

/// Matches transcripts against the trigger vocabulary
#[derive(Debug, Clone)]
pub struct WakeWordMatcher {
    triggers: Vec<String>,
    lead_words: Vec<String>,
    variants: Vec<Vec<String>>,
}

impl WakeWordMatcher {
    /// Create a matcher
    ///
    /// # Arguments
    ///
    /// * `triggers` - Phrases that wake the assistant on their own (e.g., "hey neptr")
    /// * `lead_words` - Greeting words that may precede a misheard name
    /// * `variants` - Phonetic near-misses of the assistant's name
    ///
    /// # Errors
    ///
    /// Returns error if no trigger phrase is configured
    pub fn new(triggers: Vec<String>, lead_words: Vec<String>, variants: Vec<String>) -> Result<Self> {
        let triggers: Vec<String> = triggers
            .iter()
            .map(|t| normalize(t))
            .filter(|t| !t.is_empty())
            .collect();

        if triggers.is_empty() {
            return Err(Error::Config("at least one wake trigger is required".to_string()));
        }

        let lead_words = lead_words
            .iter()
            .map(|w| normalize(w))
            .filter(|w| !w.is_empty())
            .collect();
        let variants = variants
            .iter()
            .map(|v| tokenize(v))
            .filter(|v| !v.is_empty())
            .collect();

        tracing::debug!(triggers = triggers.len(), "wake word matcher initialized");

        Ok(Self {
            triggers,
            lead_words,
            variants,
        })
    }

    /// Check if a transcript contains a wake phrase
    #[must_use]
    pub fn matches(&self, transcript: &str) -> bool {
        self.find(transcript).is_some()
    }

    /// Locate the wake phrase and return what followed it
    #[must_use]
    pub fn find(&self, transcript: &str) -> Option<WakeMatch> {
        let normalized = normalize(transcript);
        if normalized.is_empty() {
            return None;
        }

        if let Some(found) = self.find_exact(&normalized) {
            tracing::info!(trigger = %found.phrase, transcript = %normalized, "wake phrase detected");
            return Some(found);
        }

        let found = self.find_fuzzy(&normalized)?;
        tracing::info!(variant = %found.phrase, transcript = %normalized, "fuzzy wake phrase detected");
        Some(found)
    }

    fn find_exact(&self, normalized: &str) -> Option<WakeMatch> {
        // Prefer the trigger that ends latest so "hey neptr" wins over "neptr"
        self.triggers
            .iter()
            .filter_map(|t| normalized.find(t.as_str()).map(|pos| (t, pos + t.len())))
            .max_by_key(|&(t, end)| (end, t.len()))
            .map(|(t, end)| WakeMatch {
                phrase: t.clone(),
                remainder: clean_remainder(&normalized[end..]),
            })
    }

    fn find_fuzzy(&self, normalized: &str) -> Option<WakeMatch> {
        let tokens = tokenize(normalized);
        let has_lead = tokens
            .iter()
            .any(|token| self.lead_words.iter().any(|lead| lead == token));
        if !has_lead {
            return None;
        }

        self.variants.iter().find_map(|variant| {
            let end = find_token_run(&tokens, variant)? + variant.len();
            Some(WakeMatch {
                phrase: variant.join(" "),
                remainder: tokens[end..].join(" "),
            })
        })
    }

    /// Configured trigger phrases
    #[must_use]
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }
}

/// Lowercase and trim
fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Split into lowercase word tokens, keeping apostrophes inside words
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Index of the first contiguous occurrence of `needle` in `tokens`
fn find_token_run(tokens: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > tokens.len() {
        return None;
    }
    tokens.windows(needle.len()).position(|w| w == needle)
}

fn clean_remainder(rest: &str) -> String {
    rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == '!')
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> WakeWordMatcher {
        WakeWordMatcher::new(
            vec!["hello neptr".into(), "hey neptr".into(), "neptr".into()],
            vec!["hello".into(), "hey".into(), "hi".into()],
            vec!["after".into(), "nectar".into(), "nefter".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_match() {
        assert!(matcher().matches("hello neptr"));
        assert!(matcher().matches("  Hey NEPTR  "));
    }

    #[test]
    fn test_lead_and_variant() {
        assert!(matcher().matches("hello after"));
        assert!(matcher().matches("hi, nectar!"));
    }

    #[test]
    fn test_lead_word_alone_does_not_trigger() {
        assert!(!matcher().matches("hello world"));
        assert!(!matcher().matches("after the show"));
    }

    #[test]
    fn test_lead_word_needs_token_boundary() {
        assert!(!matcher().matches("hide and seek"));
        assert!(!matcher().matches("this after party"));
    }

    #[test]
    fn test_remainder_after_trigger() {
        let found = matcher().find("Hey Neptr, what time is it?").unwrap();
        assert_eq!(found.phrase, "hey neptr");
        assert_eq!(found.remainder, "what time is it?");

        let found = matcher().find("hello after tell me a joke").unwrap();
        assert_eq!(found.remainder, "tell me a joke");
    }

    #[test]
    fn test_empty_triggers_rejected() {
        assert!(WakeWordMatcher::new(vec!["  ".into()], Vec::new(), Vec::new()).is_err());
    }
}
