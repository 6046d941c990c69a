//! Transcript fragments and their assembly into one document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text produced from one audio segment, tagged with the segment's ordinal
/// index so assembly can restore chronological order no matter when the
/// fragment was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub index: usize,
    pub text: String,
}

/// The ordered concatenation of every fragment for one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub fragment_count: usize,
    pub completed_at: DateTime<Utc>,
}

/// Join fragments into one document.
///
/// Fragments are sorted by ordinal index first; the orchestrator processes
/// segments in order, but assembly must not depend on that. Fragments are
/// joined with a newline so words on either side of a cut never run together.
pub fn assemble(mut fragments: Vec<TranscriptFragment>) -> Transcript {
    fragments.sort_by_key(|f| f.index);

    let text = fragments
        .iter()
        .map(|f| f.text.trim())
        .collect::<Vec<_>>()
        .join("\n");

    Transcript {
        text,
        fragment_count: fragments.len(),
        completed_at: Utc::now(),
    }
}
