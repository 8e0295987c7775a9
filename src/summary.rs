use crate::db::{Message, SenderRole};
use crate::gemini::GeminiClient;
use tracing::{debug, warn};

/// Returned when no provider credential is configured.
pub const OFFLINE_SUMMARY: &str = "Professional medical summary from history.";

/// Returned when the provider was tried and failed.
pub const FALLBACK_SUMMARY: &str =
    "Clinical summary highlighting patient symptoms and recommended follow-up actions.";

/// Stand-in content for audio-only messages.
pub const AUDIO_MARKER: &str = "[Audio]";

/// One line of a consultation transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub speaker: SenderRole,
    pub content: String,
}

impl From<&Message> for TranscriptLine {
    fn from(message: &Message) -> Self {
        Self {
            speaker: message.sender_role,
            content: message
                .original_text
                .clone()
                .unwrap_or_else(|| AUDIO_MARKER.to_string()),
        }
    }
}

/// Render transcript lines as `SPEAKER: content`, one per line
fn build_transcript(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(|l| format!("{}: {}", l.speaker, l.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_summary_prompt(transcript: &str) -> String {
    format!(
        "Summarize this medical consultation focus on clinical points. Consultation:\n{}",
        transcript
    )
}

/// Summarizes consultations through Gemini with canned fallbacks.
#[derive(Debug, Clone)]
pub struct SummaryService {
    provider: GeminiClient,
}

impl SummaryService {
    pub fn new(provider: GeminiClient) -> Self {
        Self { provider }
    }

    /// Summarize messages given in chronological order. Never fails.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        let lines: Vec<TranscriptLine> = messages.iter().map(TranscriptLine::from).collect();
        self.summarize_transcript(&lines).await
    }

    pub async fn summarize_transcript(&self, lines: &[TranscriptLine]) -> String {
        if !self.provider.has_credential() {
            debug!("No provider credential configured, returning offline summary");
            return OFFLINE_SUMMARY.to_string();
        }

        let prompt = build_summary_prompt(&build_transcript(lines));

        match self.provider.generate(&prompt).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary generation failed ({}), using fallback summary", e);
                FALLBACK_SUMMARY.to_string()
            }
        }
    }
}
