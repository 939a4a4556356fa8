//! Transcript normalization and trigger phrase matching.

use std::collections::BTreeSet;

/// Lower-case a transcript, trim it, and collapse runs of whitespace.
pub fn normalize_transcript(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Containment matcher over a set of normalized trigger phrases.
///
/// Blank phrases are dropped. A matcher with no phrases left never matches,
/// which is how an unusable phrase set degrades to "no keyword configured".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordMatcher {
    phrases: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = phrases
            .into_iter()
            .map(|p| normalize_transcript(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            phrases: unique.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// The first configured phrase contained in `transcript`, if any.
    ///
    /// At most one phrase is reported per call no matter how many times
    /// phrases occur in the segment.
    pub fn find(&self, transcript: &str) -> Option<&str> {
        if self.phrases.is_empty() {
            return None;
        }
        let normalized = normalize_transcript(transcript);
        self.phrases
            .iter()
            .find(|phrase| normalized.contains(phrase.as_str()))
            .map(String::as_str)
    }
}
