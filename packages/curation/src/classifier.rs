//! Heuristic review text classifier.
//!
//! Decides whether a piece of free text is an authentic third-party review
//! worth showing, and produces a cleaned version with operator replies
//! stripped. Classification is a pure function of the text and the
//! configured rule lists: no side effects, no network, no storage.
//!
//! Rules run in a fixed order and short-circuit on the first match:
//! reply-stripping, length floor, banned phrases, banned openers (anchored
//! longest-first alternation), named templated-phrasing rules, and finally
//! an authentic-signal check for texts on the shorter side.
//!
//! The numeric thresholds (40/120 characters) and the default Italian rule
//! lists are empirically tuned for one market; they are configurable but
//! the defaults are not derived from a principled model.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Why a review text was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Nothing left after reply-stripping.
    Empty,
    /// Below the minimum length threshold.
    TooShort,
    /// Contains a banned boilerplate phrase.
    BannedPhrase,
    /// Starts with a banned opener.
    BannedOpener,
    /// Matched a named templated-phrasing rule.
    Templated(String),
    /// Short text with no authentic-client vocabulary.
    NoAuthenticSignal,
}

/// Classification outcome. Rating and date are never touched; only text
/// is cleaned or rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReview {
    /// Reply-stripped, whitespace-normalized text.
    pub text: String,

    /// True if the review should be kept.
    pub kept: bool,

    /// Reject reason, when not kept.
    pub reject_reason: Option<RejectReason>,
}

impl ClassifiedReview {
    fn kept(text: String) -> Self {
        Self {
            text,
            kept: true,
            reject_reason: None,
        }
    }

    fn rejected(text: String, reason: RejectReason) -> Self {
        Self {
            text,
            kept: false,
            reject_reason: Some(reason),
        }
    }
}

/// Rule lists and thresholds driving classification.
///
/// Defaults target Italian-language review corpora.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Hard minimum length in characters; anything shorter is rejected.
    pub min_len: usize,

    /// Secondary threshold: texts shorter than this must carry at least
    /// one authentic-signal word.
    pub short_len: usize,

    /// Phrases marking the start of an operator reply; text is truncated
    /// before the earliest occurrence.
    pub reply_markers: Vec<String>,

    /// Banned boilerplate phrases (case-insensitive substring match).
    pub banned_phrases: Vec<String>,

    /// Banned openers (exact word or word-plus-space at the start).
    pub banned_openers: Vec<String>,

    /// Vocabulary indicating a real encounter.
    pub signal_words: Vec<String>,

    /// Named templated-phrasing rules as `(name, pattern)` pairs; patterns
    /// are compiled case-insensitively.
    pub templated_rules: Vec<(String, String)>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_len: 40,
            short_len: 120,
            reply_markers: vec![
                "ha risposto".into(),
                "risposta del gestore".into(),
                "risposta dell'inserzionista".into(),
            ],
            banned_phrases: vec![
                "grazie mille".into(),
                "grazie di cuore".into(),
                "grazie a tutti".into(),
                "ci scusiamo".into(),
                "ringrazio per la recensione".into(),
                "ringraziamo per la recensione".into(),
            ],
            banned_openers: vec![
                "grazie".into(),
                "ciao".into(),
                "salve".into(),
                "buongiorno".into(),
                "buonasera".into(),
                "complimenti".into(),
                "benvenuti".into(),
            ],
            signal_words: vec![
                "appuntamento".into(),
                "puntuale".into(),
                "puntualissima".into(),
                "pulito".into(),
                "pulita".into(),
                "posizione".into(),
                "zona".into(),
                "foto reali".into(),
                "come in foto".into(),
                "educata".into(),
                "disponibile".into(),
                "consigliata".into(),
                "consiglio".into(),
                "tornerò".into(),
            ],
            templated_rules: vec![
                (
                    "gratitude-template".into(),
                    r"\b(?:ti|vi)\s+(?:ringrazio|aspetto|bacio)\b".into(),
                ),
                (
                    "see-you-soon".into(),
                    r"\b(?:a\s+presto|ci\s+vediamo\s+presto|alla\s+prossima)\b".into(),
                ),
                (
                    "my-clients".into(),
                    r"\b(?:miei|mie)\s+(?:clienti|ospiti)\b".into(),
                ),
            ],
        }
    }
}

impl ClassifierConfig {
    /// Create a config with the default rule lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the length thresholds.
    pub fn with_thresholds(mut self, min_len: usize, short_len: usize) -> Self {
        self.min_len = min_len;
        self.short_len = short_len;
        self
    }

    /// Replace the banned-phrase list.
    pub fn with_banned_phrases(mut self, phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.banned_phrases = phrases.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Replace the banned-opener list.
    pub fn with_banned_openers(mut self, openers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.banned_openers = openers.into_iter().map(|o| o.into()).collect();
        self
    }

    /// Replace the authentic-signal vocabulary.
    pub fn with_signal_words(mut self, words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.signal_words = words.into_iter().map(|w| w.into()).collect();
        self
    }
}

/// A named templated-phrasing predicate, compiled once at construction.
struct TemplatedRule {
    name: String,
    pattern: Regex,
}

impl TemplatedRule {
    fn test(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// The classifier proper. Construct once, share freely: `classify` takes
/// `&self` and touches no mutable state.
pub struct ReviewClassifier {
    config: ClassifierConfig,
    /// Anchored alternation of banned openers, sorted longest-first so a
    /// longer opener is never shadowed by one of its prefixes.
    opener_pattern: Option<Regex>,
    templated_rules: Vec<TemplatedRule>,
}

impl Default for ReviewClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl ReviewClassifier {
    /// Compile a classifier from a rule config.
    ///
    /// Invalid templated-rule patterns are logged and dropped rather than
    /// failing construction.
    pub fn new(config: ClassifierConfig) -> Self {
        let opener_pattern = build_opener_pattern(&config.banned_openers);

        let templated_rules = config
            .templated_rules
            .iter()
            .filter_map(|(name, pattern)| {
                match Regex::new(&format!("(?i){}", pattern)) {
                    Ok(compiled) => Some(TemplatedRule {
                        name: name.clone(),
                        pattern: compiled,
                    }),
                    Err(e) => {
                        tracing::warn!(rule = name.as_str(), error = %e, "dropping invalid templated rule");
                        None
                    }
                }
            })
            .collect();

        Self {
            config,
            opener_pattern,
            templated_rules,
        }
    }

    /// The rule configuration this classifier was built from.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a piece of free text.
    pub fn classify(&self, text: &str) -> ClassifiedReview {
        // 1. Strip operator replies and normalize whitespace.
        let cleaned = self.strip_reply(text);

        // 2. Length floor.
        if cleaned.is_empty() {
            return ClassifiedReview::rejected(cleaned, RejectReason::Empty);
        }
        if cleaned.chars().count() < self.config.min_len {
            return ClassifiedReview::rejected(cleaned, RejectReason::TooShort);
        }

        let lower = cleaned.to_lowercase();

        // 3. Banned boilerplate phrases.
        if self
            .config
            .banned_phrases
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
        {
            return ClassifiedReview::rejected(cleaned, RejectReason::BannedPhrase);
        }

        // 4. Banned openers.
        if let Some(pattern) = &self.opener_pattern {
            if pattern.is_match(&cleaned) {
                return ClassifiedReview::rejected(cleaned, RejectReason::BannedOpener);
            }
        }

        // 5. Templated phrasing rules, in order.
        for rule in &self.templated_rules {
            if rule.test(&cleaned) {
                return ClassifiedReview::rejected(
                    cleaned,
                    RejectReason::Templated(rule.name.clone()),
                );
            }
        }

        // 6. Short texts must carry an authentic-client signal.
        if cleaned.chars().count() < self.config.short_len
            && !self
                .config
                .signal_words
                .iter()
                .any(|w| lower.contains(&w.to_lowercase()))
        {
            return ClassifiedReview::rejected(cleaned, RejectReason::NoAuthenticSignal);
        }

        // 7. Keep.
        ClassifiedReview::kept(cleaned)
    }

    /// Truncate before the earliest reply marker and collapse whitespace.
    fn strip_reply(&self, text: &str) -> String {
        let lower = text.to_lowercase();

        let mut cut = self
            .config
            .reply_markers
            .iter()
            .filter_map(|marker| lower.find(&marker.to_lowercase()))
            .min()
            .unwrap_or(text.len())
            .min(text.len());

        // Lowercasing can shift byte offsets for some scripts; snap back to
        // a char boundary before slicing.
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }

        text[..cut].split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Build the anchored opener alternation.
///
/// Openers are escaped and sorted longest-first before joining, so
/// "grazie mille" would win over "grazie" if both were listed. Each
/// opener must be followed by whitespace, punctuation, or end-of-text.
fn build_opener_pattern(openers: &[String]) -> Option<Regex> {
    if openers.is_empty() {
        return None;
    }

    let mut sorted: Vec<&String> = openers.iter().collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let alternation = sorted
        .iter()
        .map(|o| regex::escape(o))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = format!(r"(?i)^(?:{})(?:[\s,.!:;]|$)", alternation);
    match Regex::new(&pattern) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            tracing::warn!(error = %e, "dropping invalid opener pattern");
            None
        }
    }
}
