//! Speech recognition — the platform engine behind voice capture.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 RecognitionSession (CaptureSource)           │
//! │                                                             │
//! │  MicCapture ─▶ downmix/resample ─▶ SilenceDetector          │
//! │                     │                                       │
//! │                     ▼                                       │
//! │            Transcriber (trait) ── WhisperTranscriber        │
//! │                     │                                       │
//! │                     ▼                                       │
//! │        RecognitionEvent (interim / final / ended / error)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session owns the microphone and the engine and emits structured
//! [`RecognitionEvent`]s to a single handler over an mpsc channel; nothing
//! else mutates capture state.

pub mod event;
pub mod session;
pub mod transcriber;

pub use event::{Hypothesis, RecognitionEvent};
pub use session::{CaptureSource, RecognitionSession, UnavailableSource};
pub use transcriber::{SpeechError, Transcriber, WhisperTranscriber};

#[cfg(test)]
pub use transcriber::MockTranscriber;
