//! The recognition session — one owned, reusable voice-capture resource.
//!
//! [`RecognitionSession`] is created lazily by the controller on the first
//! capture request and reused across start/stop cycles; it is dropped only
//! with its owning controller.  Each controller owns its own session — there
//! is no process-wide shared session.
//!
//! # Worker thread
//!
//! `cpal::Stream` is not `Send` on every platform, so the microphone stream
//! lives entirely inside a dedicated worker thread spawned on first start.
//! The thread accumulates resampled 16 kHz mono audio while the session is
//! active, runs interim decodes as audio arrives, finalizes a hypothesis
//! when an utterance ends in silence, and signals speech end after a long
//! stretch with no voice.  All output flows through one
//! [`RecognitionEvent`] channel — the single-handler contract.
//!
//! Start/stop from the controller only flip an atomic flag; the stream and
//! the worker keep running so a session restart is cheap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::{downmix_to_mono, resample_to_16k, MicCapture, SilenceDetector};
use crate::config::{AudioConfig, SpeechConfig};
use crate::speech::event::{Hypothesis, RecognitionEvent};
use crate::speech::transcriber::{SpeechError, Transcriber};

/// Minimum utterance length handed to the engine: 0.5 s at 16 kHz.
const MIN_DECODE_SAMPLES: usize = 8_000;

/// Samples per millisecond at the 16 kHz target rate.
const SAMPLES_PER_MS: usize = 16;

// ---------------------------------------------------------------------------
// CaptureSource trait
// ---------------------------------------------------------------------------

/// Seam between the controller and the recognition engine.
///
/// The production implementation is [`RecognitionSession`];
/// [`UnavailableSource`] stands in when the engine cannot run on this
/// machine, and tests substitute their own sources.
pub trait CaptureSource: Send {
    /// Capability check: `Ok` when a session could be started right now.
    fn availability(&self) -> Result<(), SpeechError>;

    /// Activate capture.  Events are delivered to `events`; the sender
    /// passed on the first call is kept for the session's lifetime.
    fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), SpeechError>;

    /// Deactivate capture.  Idempotent; a pending voiced utterance is still
    /// finalized and may arrive after this call returns.
    fn stop(&mut self);

    /// Whether capture is currently active.
    fn is_active(&self) -> bool;
}

// ---------------------------------------------------------------------------
// RecognitionSession
// ---------------------------------------------------------------------------

/// Owns the microphone worker and emits [`RecognitionEvent`]s while active.
pub struct RecognitionSession {
    speech: SpeechConfig,
    audio: AudioConfig,
    transcriber: Arc<dyn Transcriber>,
    active: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl RecognitionSession {
    /// Create an inactive session.  No audio resources are acquired until
    /// the first [`CaptureSource::start`] call.
    pub fn new(speech: SpeechConfig, audio: AudioConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            speech,
            audio,
            transcriber,
            active: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    fn spawn_worker(&mut self, events: mpsc::Sender<RecognitionEvent>) {
        let ctx = WorkerContext {
            speech: self.speech.clone(),
            audio: self.audio.clone(),
            transcriber: Arc::clone(&self.transcriber),
            active: Arc::clone(&self.active),
            shutdown: Arc::clone(&self.shutdown),
            events,
        };

        let handle = std::thread::Builder::new()
            .name("recognition-session".into())
            .spawn(move || worker_loop(ctx))
            .expect("failed to spawn recognition worker thread");

        self.worker = Some(handle);
    }
}

impl CaptureSource for RecognitionSession {
    fn availability(&self) -> Result<(), SpeechError> {
        if !MicCapture::input_available() {
            return Err(SpeechError::EngineUnavailable(
                "no audio input device".into(),
            ));
        }
        Ok(())
    }

    fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), SpeechError> {
        self.availability()?;

        if self.worker.is_none() {
            self.spawn_worker(events);
        }

        self.active.store(true, Ordering::SeqCst);
        log::debug!(
            "recognition session active (language={}, continuous={})",
            self.speech.language,
            self.speech.continuous
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            // The worker polls the shutdown flag at least every 100 ms.
            let _ = handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// UnavailableSource
// ---------------------------------------------------------------------------

/// Stand-in capture source used when the engine cannot run (missing model
/// file, no audio backend).  Start requests fail with the stored reason.
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl CaptureSource for UnavailableSource {
    fn availability(&self) -> Result<(), SpeechError> {
        Err(SpeechError::EngineUnavailable(self.reason.clone()))
    }

    fn start(&mut self, _events: mpsc::Sender<RecognitionEvent>) -> Result<(), SpeechError> {
        Err(SpeechError::EngineUnavailable(self.reason.clone()))
    }

    fn stop(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct WorkerContext {
    speech: SpeechConfig,
    audio: AudioConfig,
    transcriber: Arc<dyn Transcriber>,
    active: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    events: mpsc::Sender<RecognitionEvent>,
}

/// Per-capture-cycle accumulation state, reset on every activation.
#[derive(Default)]
struct CycleState {
    /// 16 kHz mono samples of the current utterance.
    utterance: Vec<f32>,
    /// Whether any voice frame was seen in the current utterance.
    voiced: bool,
    /// Samples accumulated since the last interim decode.
    since_interim: usize,
    /// Samples since the last voice frame anywhere in the cycle.
    silent_run: usize,
    /// Count of finalized results this cycle — the resume index.
    finalized: usize,
}

fn worker_loop(ctx: WorkerContext) {
    // The stream must be created on this thread (cpal::Stream is !Send).
    let capture = match MicCapture::new(ctx.audio.input_device.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            send(&ctx, RecognitionEvent::Error(SpeechError::PermissionDenied(e.to_string())));
            ctx.active.store(false, Ordering::SeqCst);
            return;
        }
    };

    let (chunk_tx, chunk_rx) = std::sync::mpsc::channel();
    let _stream = match capture.start(chunk_tx) {
        Ok(handle) => handle,
        Err(e) => {
            send(&ctx, RecognitionEvent::Error(SpeechError::PermissionDenied(e.to_string())));
            ctx.active.store(false, Ordering::SeqCst);
            return;
        }
    };

    log::info!(
        "microphone stream open ({} Hz, {} ch)",
        capture.sample_rate(),
        capture.channels()
    );

    let detector = SilenceDetector::new(ctx.audio.rms_threshold);
    let utterance_silence = ctx.speech.utterance_silence_ms as usize * SAMPLES_PER_MS;
    let end_silence = ctx.speech.end_silence_ms as usize * SAMPLES_PER_MS;
    let interim_interval = ctx.audio.interim_interval_ms as usize * SAMPLES_PER_MS;

    let mut cycle = CycleState::default();
    let mut was_active = false;

    loop {
        if ctx.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let chunk = match chunk_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(chunk) => Some(chunk),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return,
        };

        let is_active = ctx.active.load(Ordering::SeqCst);

        // Falling edge: explicit stop.  Flush any pending voiced utterance
        // so a final result already in flight is not lost — the handler
        // tolerates it arriving after the stop.
        if was_active && !is_active {
            if cycle.voiced {
                finalize(&ctx, &detector, &mut cycle);
            }
            cycle = CycleState::default();
        }

        // Rising edge: fresh capture cycle.  Audio buffered while inactive
        // (including the chunk just received) is stale — drop it.
        if !was_active && is_active {
            cycle = CycleState::default();
            while chunk_rx.try_recv().is_ok() {}
            was_active = true;
            continue;
        }

        was_active = is_active;

        let Some(chunk) = chunk else { continue };
        if !is_active {
            continue;
        }

        let mono = downmix_to_mono(&chunk.samples, chunk.channels);
        let pcm = resample_to_16k(&mono, chunk.sample_rate);
        if pcm.is_empty() {
            continue;
        }

        let has_voice = detector.contains_voice(&pcm);
        if has_voice {
            cycle.silent_run = 0;
            cycle.voiced = true;
        } else {
            cycle.silent_run += pcm.len();
        }

        cycle.utterance.extend_from_slice(&pcm);
        cycle.since_interim += pcm.len();

        // Utterance boundary: voice followed by enough trailing silence.
        if cycle.voiced && detector.trailing_silence(&cycle.utterance) >= utterance_silence {
            if !finalize(&ctx, &detector, &mut cycle) {
                ctx.active.store(false, Ordering::SeqCst);
                continue;
            }
            if !ctx.speech.continuous {
                send(&ctx, RecognitionEvent::SpeechEnded);
                ctx.active.store(false, Ordering::SeqCst);
            }
            continue;
        }

        // Interim pass: surface a provisional hypothesis for live display.
        if ctx.speech.interim_results
            && cycle.voiced
            && cycle.since_interim >= interim_interval
            && cycle.utterance.len() >= MIN_DECODE_SAMPLES
        {
            cycle.since_interim = 0;
            match ctx.transcriber.transcribe(&cycle.utterance) {
                Ok(text) if !text.is_empty() => {
                    send(
                        &ctx,
                        RecognitionEvent::Result {
                            resume_index: cycle.finalized,
                            hypotheses: vec![Hypothesis::interim(text)],
                        },
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    send(&ctx, RecognitionEvent::Error(e));
                    ctx.active.store(false, Ordering::SeqCst);
                }
            }
            continue;
        }

        // Speech end: no voice at all for the configured interval.
        if cycle.silent_run >= end_silence {
            log::debug!("no voice for {} ms — speech ended", ctx.speech.end_silence_ms);
            send(&ctx, RecognitionEvent::SpeechEnded);
            ctx.active.store(false, Ordering::SeqCst);
            cycle = CycleState::default();
        }
    }
}

/// Decode the voiced part of the current utterance and emit a final result.
///
/// Returns `false` when the engine failed (the caller deactivates the
/// session).  Short utterances are discarded silently.
fn finalize(ctx: &WorkerContext, detector: &SilenceDetector, cycle: &mut CycleState) -> bool {
    let trailing = detector.trailing_silence(&cycle.utterance);
    let speech_len = cycle.utterance.len().saturating_sub(trailing);

    let ok = if speech_len >= MIN_DECODE_SAMPLES {
        match ctx.transcriber.transcribe(&cycle.utterance[..speech_len]) {
            Ok(text) if !text.is_empty() => {
                send(
                    ctx,
                    RecognitionEvent::Result {
                        resume_index: cycle.finalized,
                        hypotheses: vec![Hypothesis::finalized(text)],
                    },
                );
                cycle.finalized += 1;
                true
            }
            Ok(_) => true,
            Err(e) => {
                send(ctx, RecognitionEvent::Error(e));
                false
            }
        }
    } else {
        log::debug!("utterance too short ({speech_len} samples) — discarded");
        true
    };

    cycle.utterance.clear();
    cycle.voiced = false;
    cycle.since_interim = 0;
    ok
}

fn send(ctx: &WorkerContext, event: RecognitionEvent) {
    // blocking_send: the handler task always returns to its receive loop,
    // and losing a final result is worse than briefly stalling this thread.
    if ctx.events.blocking_send(event).is_err() {
        log::debug!("recognition event receiver dropped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::transcriber::MockTranscriber;

    #[test]
    fn unavailable_source_rejects_start() {
        let (tx, _rx) = mpsc::channel(4);
        let mut source = UnavailableSource::new("model not found: base.en");

        assert!(matches!(
            source.availability(),
            Err(SpeechError::EngineUnavailable(_))
        ));
        assert!(source.start(tx).is_err());
        assert!(!source.is_active());
    }

    #[test]
    fn unavailable_source_stop_is_noop() {
        let mut source = UnavailableSource::new("x");
        source.stop();
        assert!(!source.is_active());
    }

    #[test]
    fn session_starts_inactive_with_no_worker() {
        let session = RecognitionSession::new(
            SpeechConfig::default(),
            AudioConfig::default(),
            Arc::new(MockTranscriber::ok("hello")),
        );
        assert!(!session.is_active());
        assert!(session.worker.is_none());
    }

    #[test]
    fn stop_without_start_leaves_session_inactive() {
        let mut session = RecognitionSession::new(
            SpeechConfig::default(),
            AudioConfig::default(),
            Arc::new(MockTranscriber::ok("hello")),
        );
        session.stop();
        assert!(!session.is_active());
    }

    #[test]
    fn capture_source_is_object_safe() {
        let source: Box<dyn CaptureSource> = Box::new(UnavailableSource::new("x"));
        assert!(!source.is_active());
    }
}
