//! Core transcription trait and implementations.
//!
//! # Overview
//!
//! [`Transcriber`] is the blocking audio→text seam used by the recognition
//! session worker.  It is object-safe and `Send + Sync` so it can be held
//! behind an `Arc<dyn Transcriber>`.
//!
//! [`WhisperTranscriber`] is the production implementation wrapping a
//! `whisper_rs::WhisperContext`.  Construct it with
//! [`WhisperTranscriber::load`].
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) returns a
//! pre-configured response — useful for unit-testing the session and the
//! controller without a GGML model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// All errors that can arise from the speech subsystem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeechError {
    /// Microphone access was denied or the input stream could not be opened.
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    /// The recognition engine is not usable on this machine (missing model
    /// file, no input device).  Start requests become no-ops.
    #[error("speech recognition unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine failed during recognition.  Carries the raw engine error
    /// code so it can be surfaced to the user verbatim.
    #[error("recognition engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for blocking transcription.
///
/// # Contract
///
/// `audio` must be **16 kHz, mono, f32** PCM samples.  Callers are expected
/// to skip buffers shorter than ~0.5 s; the engine hallucinates on them.
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` and return the recognized text.
    fn transcribe(&self, audio: &[f32]) -> Result<String, SpeechError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

/// Production transcriber that wraps a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created for every [`transcribe`] call so the
/// engine can be shared across threads without any locking.
///
/// [`transcribe`]: Transcriber::transcribe
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    /// ISO-639-1 code passed to whisper (primary subtag of the configured
    /// BCP-47 tag, e.g. `"en-US"` → `"en"`).
    language: String,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("language", &self.language)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send` and `unsafe impl Sync` in whisper-rs — the model
// weights are read-only after loading.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperTranscriber {}
unsafe impl Sync for WhisperTranscriber {}

impl WhisperTranscriber {
    /// Load a GGML model from `model_path` and prepare it for inference.
    ///
    /// `language` is a BCP-47 tag; only its primary subtag is handed to the
    /// engine.
    ///
    /// # Errors
    ///
    /// - [`SpeechError::EngineUnavailable`] — `model_path` does not exist or
    ///   whisper-rs failed to load it.
    pub fn load(model_path: impl AsRef<Path>, language: &str) -> Result<Self, SpeechError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SpeechError::EngineUnavailable(format!(
                "model not found: {}",
                path.display()
            )));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SpeechError::EngineUnavailable(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SpeechError::EngineUnavailable(e.to_string()))?;

        Ok(Self {
            ctx,
            language: primary_subtag(language).to_string(),
            n_threads: optimal_threads(),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SpeechError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(self.language.as_str()));
        params.set_n_threads(self.n_threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SpeechError::Engine(e.to_string()))?;

        state
            .full(params, audio)
            .map_err(|e| SpeechError::Engine(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SpeechError::Engine(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SpeechError::Engine(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Primary subtag of a BCP-47 language tag (`"en-US"` → `"en"`).
pub fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Thread count for whisper inference: physical parallelism capped at 4.
fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(2) as i32
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response without loading any
/// model file.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, SpeechError>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Create a mock that always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: SpeechError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SpeechError> {
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- MockTranscriber ---

    #[test]
    fn mock_ok_returns_configured_text() {
        let engine = MockTranscriber::ok("I earn five thousand monthly");
        let audio = vec![0.0f32; 16_000];
        assert_eq!(
            engine.transcribe(&audio).unwrap(),
            "I earn five thousand monthly"
        );
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let engine = MockTranscriber::err(SpeechError::Engine("no-speech".into()));
        let audio = vec![0.0f32; 16_000];
        let err = engine.transcribe(&audio).unwrap_err();
        assert!(matches!(err, SpeechError::Engine(_)));
    }

    // --- WhisperTranscriber::load missing path ---

    #[test]
    fn load_missing_model_returns_unavailable() {
        let result = WhisperTranscriber::load("/nonexistent/model.bin", "en-US");
        assert!(
            matches!(result, Err(SpeechError::EngineUnavailable(_))),
            "expected EngineUnavailable, got: {result:?}"
        );
    }

    // --- primary_subtag ---

    #[test]
    fn subtag_of_bcp47_tag() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert_eq!(primary_subtag("en_GB"), "en");
        assert_eq!(primary_subtag("en"), "en");
    }

    // --- Transcriber object safety ---

    #[test]
    fn box_dyn_transcriber_compiles() {
        // If this test compiles, the trait is object-safe.
        let engine: Box<dyn Transcriber> = Box::new(MockTranscriber::ok("ok"));
        let _ = engine.transcribe(&vec![0.0f32; 16_000]);
    }

    // --- SpeechError display ---

    #[test]
    fn error_display_carries_raw_code() {
        let e = SpeechError::Engine("not-allowed".into());
        assert!(e.to_string().contains("not-allowed"));
    }

    #[test]
    fn optimal_threads_is_positive_and_at_most_4() {
        let t = optimal_threads();
        assert!((1..=4).contains(&t));
    }
}
