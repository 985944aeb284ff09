//! Audio plumbing for the recognition session — microphone capture,
//! downmix/resample, and silence detection.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix_to_mono
//!           → resample_to_16k → SilenceDetector → RecognitionSession worker
//! ```

pub mod capture;
pub mod resample;
pub mod silence;

pub use capture::{AudioChunk, CaptureError, MicCapture, StreamHandle};
pub use resample::{downmix_to_mono, resample_to_16k};
pub use silence::SilenceDetector;
