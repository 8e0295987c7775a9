use crate::gemini::{GeminiClient, ProviderError};
use crate::offline;
use tracing::{debug, warn};

/// A piece of text to translate, with its declared languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
}

impl Utterance {
    pub fn new(
        text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}

/// Where a translation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Remote,
    Offline,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub text: String,
    pub provenance: Provenance,
}

/// Build the provider prompt for a clinical translation
fn build_translation_prompt(utterance: &Utterance) -> String {
    format!(
        "Translate this clinical text from {} to {}. Maintain medical context. \
         Result MUST be ONLY the translated text. Text: {}",
        utterance.source_language, utterance.target_language, utterance.text
    )
}

/// Serve an utterance from the offline phrase table.
pub fn translate_offline(utterance: &Utterance) -> TranslationResult {
    match offline::lookup(&utterance.text, &utterance.target_language) {
        Some(text) => TranslationResult {
            text,
            provenance: Provenance::Offline,
        },
        None => TranslationResult {
            text: utterance.text.clone(),
            provenance: Provenance::Passthrough,
        },
    }
}

/// Translates utterances through Gemini, degrading to the offline phrase
/// table whenever the provider is absent or fails.
///
/// Holds no mutable state; clone it freely across request handlers.
#[derive(Debug, Clone)]
pub struct TranslationService {
    provider: GeminiClient,
}

impl TranslationService {
    pub fn new(provider: GeminiClient) -> Self {
        Self { provider }
    }

    /// Translate and return only the text. Never fails.
    pub async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> String {
        self.translate_detailed(&Utterance::new(text, source_language, target_language))
            .await
            .text
    }

    /// Translate and report where the text came from. Never fails.
    pub async fn translate_detailed(&self, utterance: &Utterance) -> TranslationResult {
        if !self.provider.has_credential() {
            debug!("No provider credential configured, serving translation offline");
            return translate_offline(utterance);
        }

        let prompt = build_translation_prompt(utterance);

        match self.provider.generate(&prompt).await {
            Ok(text) => TranslationResult {
                text,
                provenance: Provenance::Remote,
            },
            Err(e) => {
                log_fallback(&e, utterance);
                translate_offline(utterance)
            }
        }
    }
}

fn log_fallback(error: &ProviderError, utterance: &Utterance) {
    if error.is_network() {
        warn!(
            "Provider offline ({}). Activating continuity mode for {} -> {}",
            error, utterance.source_language, utterance.target_language
        );
    } else {
        warn!(
            "Provider failed ({}), falling back to offline phrases for {} -> {}",
            error, utterance.source_language, utterance.target_language
        );
    }
}
