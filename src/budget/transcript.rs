//! The shared transcript buffer.
//!
//! A single mutable string: cleared when a capture starts, appended to only
//! by the recognition event handler while capture is active.  Interim
//! hypotheses never land here — only finalized text does.

// ---------------------------------------------------------------------------
// TranscriptBuffer
// ---------------------------------------------------------------------------

/// Append-only text accumulator for finalized recognition results.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranscriptBuffer {
    text: String,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all content.  Called at the start of every capture cycle.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Append a finalized fragment verbatim — the buffer afterwards equals
    /// the buffer before plus exactly `fragment`.
    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `true` when the buffer is empty or whitespace-only — invalid for
    /// submission.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl std::fmt::Display for TranscriptBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
