//! Structured events emitted by the recognition session.
//!
//! The session's cumulative result list grows as it recognizes speech; each
//! [`RecognitionEvent::Result`] carries the hypotheses from a resume index
//! into that list onward.  An interim hypothesis at index `i` may be revised
//! by later events until a final hypothesis is emitted at the same index,
//! after which the index is never revisited.

use crate::speech::transcriber::SpeechError;

// ---------------------------------------------------------------------------
// Hypothesis
// ---------------------------------------------------------------------------

/// A single recognition hypothesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis {
    /// Recognized text.
    pub text: String,
    /// `true` once the engine will not revise this hypothesis further.
    pub is_final: bool,
}

impl Hypothesis {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RecognitionEvent
// ---------------------------------------------------------------------------

/// Events delivered from the recognition session to its single handler.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// New or revised hypotheses, indexed from `resume_index` into the
    /// session's cumulative result list.
    Result {
        resume_index: usize,
        hypotheses: Vec<Hypothesis>,
    },
    /// No voice was detected for the configured interval; the session has
    /// deactivated itself.
    SpeechEnded,
    /// The engine failed; the session has deactivated itself.  Carries the
    /// raw engine error.
    Error(SpeechError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypothesis_constructors() {
        let interim = Hypothesis::interim("I earn");
        assert!(!interim.is_final);
        assert_eq!(interim.text, "I earn");

        let finalized = Hypothesis::finalized("I earn $5000 monthly");
        assert!(finalized.is_final);
    }

    #[test]
    fn result_event_carries_resume_index() {
        let event = RecognitionEvent::Result {
            resume_index: 2,
            hypotheses: vec![Hypothesis::finalized("and rent is $2000")],
        };
        match event {
            RecognitionEvent::Result {
                resume_index,
                hypotheses,
            } => {
                assert_eq!(resume_index, 2);
                assert_eq!(hypotheses.len(), 1);
            }
            _ => panic!("expected Result"),
        }
    }
}
