//! Offline phrase matcher used in continuity mode.
//!
//! A small, deterministic phrase table for the two directions the bridge
//! supports without a provider: English -> Hindi (doctor to patient) and
//! Hindi -> English (patient to doctor). Rules are checked top to bottom and
//! the first rule with a matching keyword wins, so an utterance such as
//! "hello, I have pain" is always answered with the greeting.

/// A single substitution rule.
#[derive(Debug, Clone, Copy)]
pub struct PhraseRule {
    /// Substrings looked for in the normalized input.
    pub keywords: &'static [&'static str],
    /// Builds the reply from the normalized input.
    pub respond: fn(&str) -> String,
}

impl PhraseRule {
    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| normalized.contains(k))
    }
}

/// English -> Hindi, in priority order.
pub const HINDI_RULES: &[PhraseRule] = &[
    PhraseRule {
        keywords: &["hello", "hi"],
        respond: |_| "नमस्ते".to_string(),
    },
    PhraseRule {
        keywords: &["heart rate", "pulse"],
        respond: |_| "मुझे आपकी हृदय गति की जांच करनी है।".to_string(),
    },
    PhraseRule {
        keywords: &["pain"],
        respond: |_| "क्या आपको कहीं दर्द है?".to_string(),
    },
    PhraseRule {
        keywords: &["fever", "temperature"],
        respond: |_| "क्या आपको बुखार है?".to_string(),
    },
    PhraseRule {
        keywords: &["problem", "feel"],
        respond: |_| "आपको अभी क्या समस्या हो रही है?".to_string(),
    },
    PhraseRule {
        keywords: &["relax", "worry"],
        respond: |_| "चिंता न करें, सब ठीक हो जाएगा।".to_string(),
    },
];

/// Hindi -> English, in priority order.
pub const ENGLISH_RULES: &[PhraseRule] = &[
    PhraseRule {
        keywords: &["नमस्ते", "namaste"],
        respond: |_| "Hello".to_string(),
    },
    PhraseRule {
        keywords: &["हृदय", "धड़कन", "heart"],
        respond: heart_rate_report,
    },
    PhraseRule {
        keywords: &["दर्द", "pain"],
        respond: |_| "I am feeling some pain".to_string(),
    },
    PhraseRule {
        keywords: &["बुखार", "fever"],
        respond: |_| "I have a high fever".to_string(),
    },
    PhraseRule {
        keywords: &["ठीक", "ok"],
        respond: |_| "I understand, thank you".to_string(),
    },
];

// The numeral only matters once the heart-rate rule has already matched.
fn heart_rate_report(normalized: &str) -> String {
    if normalized.contains("120") {
        "My heart rate is 120".to_string()
    } else {
        "My heart rate is high".to_string()
    }
}

/// Rule table for a target language, compared case-insensitively.
pub fn rules_for(target_language: &str) -> Option<&'static [PhraseRule]> {
    let target = target_language.trim();
    if target.eq_ignore_ascii_case("hindi") {
        Some(HINDI_RULES)
    } else if target.eq_ignore_ascii_case("english") {
        Some(ENGLISH_RULES)
    } else {
        None
    }
}

/// Lowercase and trim, the only normalization applied before matching.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Find the reply for `text`, or `None` when no rule applies.
pub fn lookup(text: &str, target_language: &str) -> Option<String> {
    let rules = rules_for(target_language)?;
    let normalized = normalize(text);

    rules
        .iter()
        .find(|rule| rule.matches(&normalized))
        .map(|rule| (rule.respond)(&normalized))
}

/// Total version of [`lookup`]: unmatched input is returned unchanged.
pub fn match_phrase(text: &str, target_language: &str) -> String {
    lookup(text, target_language).unwrap_or_else(|| text.to_string())
}
