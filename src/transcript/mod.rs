// Transcript log
//
// Folds the inbound event stream (partial transcription deltas, citation
// metadata, turn-complete signals) into an ordered transcript. Entries are
// mutated in place while a turn is open and frozen once it completes.

use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The user's microphone (input transcription)
    User,
    /// The assistant's spoken response (output transcription)
    Ai,
}

/// A web source cited by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: Option<String>,
}

/// One entry in the transcript log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Monotonic identity, unique within one log
    pub id: u64,
    pub source: Speaker,
    /// Accumulated text for this entry
    pub text: String,
    /// Set when a turn-complete signal freezes the entry
    pub is_final: bool,
    /// Unique citations in first-seen order
    pub citations: Vec<Citation>,
}

/// Ordered transcript log with per-speaker accumulation state.
///
/// Owned by one session; a new session gets a fresh log, so sequential
/// sessions never share state.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
    user_accum: String,
    ai_accum: String,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transcription delta.
    ///
    /// Extends the last entry when it belongs to the same speaker and is
    /// still open; otherwise starts a new entry carrying the speaker's
    /// accumulated text for the current turn.
    pub fn apply_delta(&mut self, source: Speaker, text: &str) {
        let accum = match source {
            Speaker::User => &mut self.user_accum,
            Speaker::Ai => &mut self.ai_accum,
        };
        accum.push_str(text);
        let accumulated = accum.clone();

        match self.entries.last_mut() {
            Some(last) if last.source == source && !last.is_final => {
                last.text = accumulated;
            }
            _ => {
                let id = self.next_id;
                self.next_id += 1;
                self.entries.push(TranscriptEntry {
                    id,
                    source,
                    text: accumulated,
                    is_final: false,
                    citations: Vec::new(),
                });
            }
        }
    }

    /// Attach a citation to the last entry if the assistant produced it
    /// and the entry is still open.
    ///
    /// Duplicates (by URI), citations with no matching entry, and citations
    /// arriving after the entry was finalized are ignored.
    pub fn apply_citation(&mut self, citation: Citation) {
        let Some(last) = self.entries.last_mut() else {
            return;
        };
        if last.source != Speaker::Ai || last.is_final {
            return;
        }
        if last.citations.iter().any(|c| c.uri == citation.uri) {
            return;
        }
        last.citations.push(citation);
    }

    /// Finalize every entry and reset accumulation, so the next delta
    /// starts a fresh entry.
    pub fn complete_turn(&mut self) {
        for entry in &mut self.entries {
            entry.is_final = true;
        }
        self.user_accum.clear();
        self.ai_accum.clear();
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
