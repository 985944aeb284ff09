//! Voice-capture controller — drives capture, submission and spreadsheet
//! fetching.
//!
//! [`VoiceCaptureController`] owns the [`TranscriptBuffer`], the
//! [`BudgetSession`] and the capture source, and responds to
//! [`ControllerCommand`]s and [`RecognitionEvent`]s received over
//! `tokio::sync::mpsc` channels.
//!
//! # State machine
//!
//! ```text
//! Idle ──start request──▶ Recording
//! Recording ──stop request────────────▶ Idle
//!           ──speech-ended signal─────▶ Idle
//!           ──engine error────────────▶ Error   (notification, capture off)
//! Error ──start request──▶ Recording            (no terminal state)
//! ```
//!
//! # Event contract
//!
//! Each recognition result event carries hypotheses from a resume point.
//! A final hypothesis is appended to the transcript and (re)schedules a
//! submission one second later; an interim hypothesis is surfaced for live
//! display only and never reaches the buffer.  Consecutive finals within
//! the window coalesce into a single submission (cancel-and-reschedule).
//!
//! Stop and an in-flight final may be observed in either order; a final or
//! a scheduled submission arriving after stop is processed normally.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::budget::session::BudgetSession;
use crate::budget::transcript::TranscriptBuffer;
use crate::config::AppConfig;
use crate::notify::{Notification, NotificationSink};
use crate::services::{AdviceService, FinancialAdvice, ServiceError, SpreadsheetService};
use crate::sheet::{decode_workbook, DownloadHandle, SheetGrid};
use crate::speech::{CaptureSource, RecognitionEvent, SpeechError};

// ---------------------------------------------------------------------------
// CaptureState
// ---------------------------------------------------------------------------

/// States of the voice-capture machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Waiting for a capture or submit request.
    #[default]
    Idle,

    /// The recognition session is active; finals accumulate in the buffer.
    Recording,

    /// The engine failed.  Capture is inactive; the next start request
    /// recovers.
    Error,
}

impl CaptureState {
    /// A short human-readable label suitable for the UI status line.
    pub fn label(&self) -> &'static str {
        match self {
            CaptureState::Idle => "Idle",
            CaptureState::Recording => "Recording",
            CaptureState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and updates
// ---------------------------------------------------------------------------

/// Commands sent from the UI to the controller.
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Begin voice capture.  Clears the transcript buffer first.
    StartCapture,
    /// End voice capture.  A no-op when no capture is active.
    StopCapture,
    /// Submit `text` to the advice service.  `from_voice` records whether
    /// the text originated from voice capture.
    Submit { text: String, from_voice: bool },
    /// Fetch, decode and install the budget spreadsheet for the last
    /// submitted prompt.
    FetchSpreadsheet,
}

/// Progress and results delivered from the controller to the UI.
#[derive(Debug, Clone)]
pub enum ControllerUpdate {
    /// The capture state machine moved.
    StateChanged(CaptureState),
    /// The transcript buffer changed; `text` is its full content.
    TranscriptChanged { text: String },
    /// The live interim hypothesis changed (`None` clears the display).
    InterimChanged { text: Option<String> },
    /// An advice request is in flight.
    SubmissionStarted,
    /// Advice arrived.
    AdviceReady(FinancialAdvice),
    /// Grid and download handle were cleared ahead of a decode attempt.
    SheetCleared,
    /// A spreadsheet was decoded and installed.
    SpreadsheetReady {
        grid: SheetGrid,
        download_path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// SubmitError
// ---------------------------------------------------------------------------

/// Why a submission did not produce advice.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The text was empty or whitespace-only; no request was sent.
    #[error("Please describe your financial situation.")]
    Validation,

    /// The advice service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

// ---------------------------------------------------------------------------
// VoiceCaptureController
// ---------------------------------------------------------------------------

/// Single writer for all capture and budget state.
///
/// Create with [`VoiceCaptureController::new`], then call
/// [`run`](Self::run) inside a tokio task.
pub struct VoiceCaptureController {
    state: CaptureState,
    transcript: TranscriptBuffer,
    budget: BudgetSession,

    source: Box<dyn CaptureSource>,
    advice: Arc<dyn AdviceService>,
    spreadsheet: Arc<dyn SpreadsheetService>,
    notifier: Arc<dyn NotificationSink>,

    update_tx: mpsc::Sender<ControllerUpdate>,
    /// Cloned into the capture source on start; holding it also keeps the
    /// event channel open for the controller's lifetime.
    event_tx: mpsc::Sender<RecognitionEvent>,

    downloads_dir: PathBuf,
    submit_delay: Duration,
    /// Pending scheduled submission.  Every final result overwrites it —
    /// cancel-and-reschedule, so a burst of finals submits once.
    submit_deadline: Option<Instant>,
    /// Prompt of the most recent submission; the spreadsheet request reuses
    /// it.
    last_prompt: Option<String>,
    engine_available: bool,
}

impl VoiceCaptureController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AppConfig,
        downloads_dir: PathBuf,
        source: Box<dyn CaptureSource>,
        advice: Arc<dyn AdviceService>,
        spreadsheet: Arc<dyn SpreadsheetService>,
        notifier: Arc<dyn NotificationSink>,
        update_tx: mpsc::Sender<ControllerUpdate>,
        event_tx: mpsc::Sender<RecognitionEvent>,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            transcript: TranscriptBuffer::new(),
            budget: BudgetSession::new(),
            source,
            advice,
            spreadsheet,
            notifier,
            update_tx,
            event_tx,
            downloads_dir,
            submit_delay: Duration::from_millis(config.speech.submit_delay_ms),
            submit_deadline: None,
            last_prompt: None,
            engine_available: true,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the controller until the command channel is closed.
    ///
    /// Spawn as a tokio task from `main()`.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ControllerCommand>,
        mut events: mpsc::Receiver<RecognitionEvent>,
    ) {
        self.check_availability();

        loop {
            // A dummy far-future deadline keeps the select arm well-formed
            // when no submission is scheduled; the arm is disabled anyway.
            let deadline = self
                .submit_deadline
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                maybe_cmd = commands.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                maybe_ev = events.recv() => {
                    // We hold a sender ourselves, so the channel cannot
                    // close while the controller is alive.
                    if let Some(ev) = maybe_ev {
                        self.handle_recognition_event(ev).await;
                    }
                },
                _ = tokio::time::sleep_until(deadline), if self.submit_deadline.is_some() => {
                    self.run_scheduled_submission().await;
                }
            }
        }

        log::info!("controller: command channel closed, shutting down");
    }

    /// Startup capability check: when the engine is unusable the user is
    /// told once, and every later start request becomes a silent no-op.
    fn check_availability(&mut self) {
        if let Err(e) = self.source.availability() {
            log::warn!("speech recognition unavailable: {e}");
            self.engine_available = false;
            self.notifier.notify(Notification::error(
                "Voice input unavailable",
                e.to_string(),
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::StartCapture => self.handle_start().await,
            ControllerCommand::StopCapture => self.handle_stop().await,
            ControllerCommand::Submit { text, from_voice } => {
                // A manual submission supersedes any scheduled one.
                self.submit_deadline = None;
                self.submit(&text, from_voice).await;
            }
            ControllerCommand::FetchSpreadsheet => self.fetch_spreadsheet().await,
        }
    }

    async fn handle_start(&mut self) {
        if !self.engine_available {
            log::debug!("start request ignored — engine unavailable");
            return;
        }

        // At most one active session: stop the existing one before a new
        // capture cycle so the buffer keeps a single writer.
        if self.source.is_active() {
            self.source.stop();
        }

        self.transcript.clear();
        self.push_transcript().await;
        self.push_interim(None).await;

        match self.source.start(self.event_tx.clone()) {
            Ok(()) => {
                self.set_state(CaptureState::Recording).await;
                self.notifier.notify(Notification::info(
                    "Recording started",
                    "Speak clearly about your income, expenses, and financial goals.",
                ));
            }
            Err(SpeechError::PermissionDenied(code)) => {
                log::error!("microphone denied: {code}");
                self.set_state(CaptureState::Error).await;
                self.notifier.notify(Notification::error(
                    "Microphone access denied",
                    "Please allow microphone access to use voice input.",
                ));
            }
            Err(e) => {
                log::error!("capture start failed: {e}");
                self.set_state(CaptureState::Error).await;
                self.notifier
                    .notify(Notification::error("Voice capture failed", e.to_string()));
            }
        }
    }

    async fn handle_stop(&mut self) {
        // Stopping while no capture is active is a no-op: no notification,
        // no state change.
        if self.state != CaptureState::Recording {
            return;
        }

        self.source.stop();
        self.set_state(CaptureState::Idle).await;
        self.push_interim(None).await;
    }

    // -----------------------------------------------------------------------
    // Recognition event handler — the buffer's single writer
    // -----------------------------------------------------------------------

    async fn handle_recognition_event(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Result {
                resume_index,
                hypotheses,
            } => {
                log::debug!(
                    "recognition result: {} hypotheses from index {resume_index}",
                    hypotheses.len()
                );

                for hypothesis in hypotheses {
                    if hypothesis.is_final {
                        self.transcript.append(&hypothesis.text);
                        self.push_transcript().await;
                        self.push_interim(None).await;
                        // Cancel-and-reschedule: late finals coalesce into
                        // one submission.
                        self.submit_deadline = Some(Instant::now() + self.submit_delay);
                    } else {
                        self.push_interim(Some(hypothesis.text)).await;
                    }
                }
            }

            RecognitionEvent::SpeechEnded => {
                log::debug!("speech ended");
                if self.state == CaptureState::Recording {
                    self.source.stop();
                    self.set_state(CaptureState::Idle).await;
                    self.push_interim(None).await;
                }
            }

            RecognitionEvent::Error(e) => {
                log::error!("recognition error: {e}");
                self.source.stop();
                self.set_state(CaptureState::Error).await;
                self.push_interim(None).await;
                // The notification carries the raw engine error code.
                self.notifier
                    .notify(Notification::error("Voice capture failed", e.to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Fire the scheduled submission with the current buffer contents.
    ///
    /// A scheduled submission also ends an active capture: the finalized
    /// result has been handed off, so the session returns to Idle.
    async fn run_scheduled_submission(&mut self) {
        self.submit_deadline = None;

        if self.state == CaptureState::Recording {
            self.source.stop();
            self.set_state(CaptureState::Idle).await;
            self.push_interim(None).await;
        }

        let text = self.transcript.as_str().to_string();
        self.submit(&text, true).await;
    }

    async fn submit(&mut self, text: &str, from_voice: bool) {
        match self.try_submit(text, from_voice).await {
            Ok(advice) => {
                self.budget.set_advice(advice.clone());
                self.push_update(ControllerUpdate::AdviceReady(advice)).await;
                self.notifier.notify(Notification::success(
                    "Financial advice generated!",
                    if from_voice {
                        "Your voice input has been analyzed successfully."
                    } else {
                        "Your budget details have been analyzed successfully."
                    },
                ));
            }
            Err(SubmitError::Validation) => {
                self.notifier.notify(Notification::error(
                    "Input required",
                    SubmitError::Validation.to_string(),
                ));
            }
            Err(SubmitError::Service(e)) => {
                log::warn!("advice request failed: {e}");
                self.notifier.notify(Notification::error(
                    "Failed to generate advice",
                    e.to_string(),
                ));
            }
        }
    }

    async fn try_submit(
        &mut self,
        text: &str,
        from_voice: bool,
    ) -> Result<FinancialAdvice, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::Validation);
        }

        self.last_prompt = Some(text.to_string());
        self.push_update(ControllerUpdate::SubmissionStarted).await;

        let advice = self.advice.request_advice(text, from_voice).await?;
        Ok(advice)
    }

    // -----------------------------------------------------------------------
    // Spreadsheet fetch
    // -----------------------------------------------------------------------

    async fn fetch_spreadsheet(&mut self) {
        let Some(prompt) = self.last_prompt.clone() else {
            self.notifier.notify(Notification::error(
                "No budget submitted",
                "Generate a budget plan before downloading the spreadsheet.",
            ));
            return;
        };

        // Clear grid and handle together before the attempt so a failure
        // can never leave stale results from an earlier fetch.
        self.budget.clear_sheet();
        self.push_update(ControllerUpdate::SheetCleared).await;

        let bytes = match self.spreadsheet.request_spreadsheet(&prompt).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("spreadsheet request failed: {e}");
                self.notifier.notify(Notification::error(
                    "Failed to fetch spreadsheet",
                    e.to_string(),
                ));
                return;
            }
        };

        // Workbook parsing is CPU-bound; keep it off the async runtime.
        let decode_input = bytes.clone();
        let decoded =
            tokio::task::spawn_blocking(move || decode_workbook(&decode_input)).await;

        let grid = match decoded {
            Ok(Ok(grid)) => grid,
            Ok(Err(e)) => {
                log::warn!("workbook decode failed: {e}");
                self.notifier.notify(Notification::error(
                    "Could not read spreadsheet",
                    e.to_string(),
                ));
                return;
            }
            Err(e) => {
                log::error!("decode task panicked: {e}");
                self.notifier.notify(Notification::error(
                    "Could not read spreadsheet",
                    "internal error while decoding the workbook",
                ));
                return;
            }
        };

        let handle = match DownloadHandle::create(&self.downloads_dir, &bytes) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("could not materialise download: {e}");
                self.notifier.notify(Notification::error(
                    "Could not save spreadsheet",
                    e.to_string(),
                ));
                return;
            }
        };

        let download_path = handle.path().to_path_buf();
        self.budget.install_sheet(grid.clone(), handle);
        self.push_update(ControllerUpdate::SpreadsheetReady {
            grid,
            download_path,
        })
        .await;
        self.notifier.notify(Notification::success(
            "Spreadsheet ready",
            "Your budget spreadsheet has been downloaded.",
        ));
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn set_state(&mut self, state: CaptureState) {
        if self.state != state {
            log::debug!("capture state: {} → {}", self.state.label(), state.label());
            self.state = state;
            self.push_update(ControllerUpdate::StateChanged(state)).await;
        }
    }

    async fn push_transcript(&mut self) {
        let text = self.transcript.as_str().to_string();
        self.push_update(ControllerUpdate::TranscriptChanged { text })
            .await;
    }

    async fn push_interim(&mut self, text: Option<String>) {
        self.push_update(ControllerUpdate::InterimChanged { text })
            .await;
    }

    async fn push_update(&mut self, update: ControllerUpdate) {
        // A failed send means the UI is gone; the result is discarded
        // silently.
        let _ = self.update_tx.send(update).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingSink;
    use crate::notify::Severity;
    use crate::services::{MockAdviceService, MockSpreadsheetService};
    use crate::speech::Hypothesis;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Capture source that records start/stop calls.
    struct ScriptedSource {
        active: Arc<AtomicBool>,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        start_error: Option<SpeechError>,
        availability_error: Option<SpeechError>,
    }

    impl ScriptedSource {
        fn working() -> Self {
            Self {
                active: Arc::new(AtomicBool::new(false)),
                starts: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
                start_error: None,
                availability_error: None,
            }
        }

        fn failing_start(error: SpeechError) -> Self {
            Self {
                start_error: Some(error),
                ..Self::working()
            }
        }

        fn unavailable(error: SpeechError) -> Self {
            Self {
                availability_error: Some(error),
                ..Self::working()
            }
        }

        fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
            (Arc::clone(&self.starts), Arc::clone(&self.stops))
        }
    }

    impl CaptureSource for ScriptedSource {
        fn availability(&self) -> Result<(), SpeechError> {
            match &self.availability_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        fn start(&mut self, _events: mpsc::Sender<RecognitionEvent>) -> Result<(), SpeechError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            match &self.start_error {
                Some(e) => Err(e.clone()),
                None => {
                    self.active.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        controller: VoiceCaptureController,
        updates: mpsc::Receiver<ControllerUpdate>,
        /// Receiver half of the controller's own event channel.  Most tests
        /// drive `handle_recognition_event` directly; the run-loop test
        /// hands this to `run`.
        events: mpsc::Receiver<RecognitionEvent>,
        sink: Arc<RecordingSink>,
        advice: Arc<MockAdviceService>,
        sheets: Arc<MockSpreadsheetService>,
        _downloads: TempDir,
    }

    fn harness_with(
        source: ScriptedSource,
        advice: MockAdviceService,
        sheets: MockSpreadsheetService,
    ) -> Harness {
        let downloads = TempDir::new().expect("temp dir");
        let (update_tx, updates) = mpsc::channel(64);
        let (event_tx, events) = mpsc::channel(64);

        let sink = Arc::new(RecordingSink::new());
        let advice = Arc::new(advice);
        let sheets = Arc::new(sheets);

        let controller = VoiceCaptureController::new(
            &AppConfig::default(),
            downloads.path().to_path_buf(),
            Box::new(source),
            Arc::clone(&advice) as Arc<dyn AdviceService>,
            Arc::clone(&sheets) as Arc<dyn SpreadsheetService>,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            update_tx,
            event_tx,
        );

        Harness {
            controller,
            updates,
            events,
            sink,
            advice,
            sheets,
            _downloads: downloads,
        }
    }

    fn harness() -> Harness {
        harness_with(
            ScriptedSource::working(),
            MockAdviceService::ok("advice text", "summary text"),
            MockSpreadsheetService::ok(two_by_two_workbook()),
        )
    }

    fn two_by_two_workbook() -> Vec<u8> {
        use rust_xlsxwriter::Workbook;
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "A").unwrap();
        worksheet.write_string(0, 1, "B").unwrap();
        worksheet.write_string(1, 0, "1").unwrap();
        worksheet.write_string(1, 1, "2").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    fn drain(updates: &mut mpsc::Receiver<ControllerUpdate>) -> Vec<ControllerUpdate> {
        let mut out = Vec::new();
        while let Ok(u) = updates.try_recv() {
            out.push(u);
        }
        out
    }

    fn final_result(text: &str, index: usize) -> RecognitionEvent {
        RecognitionEvent::Result {
            resume_index: index,
            hypotheses: vec![Hypothesis::finalized(text)],
        }
    }

    fn interim_result(text: &str, index: usize) -> RecognitionEvent {
        RecognitionEvent::Result {
            resume_index: index,
            hypotheses: vec![Hypothesis::interim(text)],
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Whitespace-only input must fail validation without touching the
    /// advice service.
    #[tokio::test]
    async fn whitespace_submission_fails_validation_and_sends_no_request() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::Submit {
                text: "   \t  ".into(),
                from_voice: false,
            })
            .await;

        assert!(h.advice.calls().is_empty());
        let recorded = h.sink.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].title, "Input required");
        assert_eq!(recorded[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn typed_submission_reaches_service_and_emits_advice() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::Submit {
                text: "I earn $5000 monthly, spend $2000 on rent".into(),
                from_voice: false,
            })
            .await;

        let calls = h.advice.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "I earn $5000 monthly, spend $2000 on rent");
        assert!(!calls[0].1);

        let updates = drain(&mut h.updates);
        assert!(updates
            .iter()
            .any(|u| matches!(u, ControllerUpdate::SubmissionStarted)));
        assert!(updates.iter().any(|u| matches!(
            u,
            ControllerUpdate::AdviceReady(a) if a.advice == "advice text"
                && a.budget_summary == "summary text"
        )));

        let recorded = h.sink.recorded();
        assert_eq!(recorded.last().unwrap().title, "Financial advice generated!");
        assert_eq!(recorded.last().unwrap().severity, Severity::Success);
    }

    #[tokio::test]
    async fn service_failure_is_notified_not_fatal() {
        let mut h = harness_with(
            ScriptedSource::working(),
            MockAdviceService::err(ServiceError::Status {
                status: 500,
                message: "backend exploded".into(),
            }),
            MockSpreadsheetService::ok(two_by_two_workbook()),
        );

        h.controller
            .handle_command(ControllerCommand::Submit {
                text: "valid prompt".into(),
                from_voice: true,
            })
            .await;

        let recorded = h.sink.recorded();
        assert_eq!(recorded.last().unwrap().title, "Failed to generate advice");
        assert!(recorded.last().unwrap().description.contains("backend exploded"));
        // Controller is still usable afterwards.
        assert_eq!(h.controller.state, CaptureState::Idle);
    }

    // -----------------------------------------------------------------------
    // Capture state machine
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn start_capture_clears_prior_buffer() {
        let mut h = harness();

        h.controller
            .handle_recognition_event(final_result("stale text", 0))
            .await;
        assert_eq!(h.controller.transcript.as_str(), "stale text");

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;

        assert_eq!(h.controller.transcript.as_str(), "");
        assert_eq!(h.controller.state, CaptureState::Recording);

        let updates = drain(&mut h.updates);
        assert!(updates.iter().any(|u| matches!(
            u,
            ControllerUpdate::TranscriptChanged { text } if text.is_empty()
        )));
    }

    #[tokio::test]
    async fn stop_without_active_capture_is_a_noop() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::StopCapture)
            .await;

        assert_eq!(h.controller.state, CaptureState::Idle);
        assert!(h.sink.recorded().is_empty());
        assert!(drain(&mut h.updates).is_empty());
    }

    #[tokio::test]
    async fn restart_stops_the_active_session_first() {
        let source = ScriptedSource::working();
        let (starts, stops) = source.counters();
        let mut h = harness_with(
            source,
            MockAdviceService::ok("a", "b"),
            MockSpreadsheetService::ok(two_by_two_workbook()),
        );

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;
        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;

        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permission_denied_surfaces_notification_and_error_state() {
        let mut h = harness_with(
            ScriptedSource::failing_start(SpeechError::PermissionDenied("not-allowed".into())),
            MockAdviceService::ok("a", "b"),
            MockSpreadsheetService::ok(two_by_two_workbook()),
        );

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;

        assert_eq!(h.controller.state, CaptureState::Error);
        let recorded = h.sink.recorded();
        assert_eq!(recorded.last().unwrap().title, "Microphone access denied");
    }

    #[tokio::test]
    async fn unavailable_engine_notifies_once_then_start_is_noop() {
        let source =
            ScriptedSource::unavailable(SpeechError::EngineUnavailable("no model".into()));
        let (starts, _stops) = source.counters();
        let mut h = harness_with(
            source,
            MockAdviceService::ok("a", "b"),
            MockSpreadsheetService::ok(two_by_two_workbook()),
        );

        h.controller.check_availability();
        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;
        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;

        // Notified exactly once; the session was never started.
        let recorded = h.sink.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].title, "Voice input unavailable");
        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert_eq!(h.controller.state, CaptureState::Idle);
    }

    #[tokio::test]
    async fn speech_ended_returns_to_idle() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;
        h.controller
            .handle_recognition_event(RecognitionEvent::SpeechEnded)
            .await;

        assert_eq!(h.controller.state, CaptureState::Idle);
    }

    #[tokio::test]
    async fn engine_error_carries_raw_code_to_notification() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;
        h.controller
            .handle_recognition_event(RecognitionEvent::Error(SpeechError::Engine(
                "network".into(),
            )))
            .await;

        assert_eq!(h.controller.state, CaptureState::Error);
        let recorded = h.sink.recorded();
        assert!(recorded.last().unwrap().description.contains("network"));
    }

    // -----------------------------------------------------------------------
    // Recognition event contract
    // -----------------------------------------------------------------------

    /// Interim hypotheses never reach the buffer; the final is appended
    /// exactly.
    #[tokio::test]
    async fn interims_are_transient_and_final_is_appended_exactly() {
        let mut h = harness();

        h.controller
            .handle_recognition_event(interim_result("I ea", 0))
            .await;
        h.controller
            .handle_recognition_event(interim_result("I earn five thou", 0))
            .await;
        assert_eq!(h.controller.transcript.as_str(), "");

        h.controller
            .handle_recognition_event(final_result("I earn $5000 monthly", 0))
            .await;
        assert_eq!(h.controller.transcript.as_str(), "I earn $5000 monthly");

        let updates = drain(&mut h.updates);
        assert!(updates.iter().any(|u| matches!(
            u,
            ControllerUpdate::InterimChanged { text: Some(t) } if t == "I earn five thou"
        )));
        // The interim display is cleared once the final lands.
        assert!(matches!(
            updates.last(),
            Some(ControllerUpdate::InterimChanged { text: None })
        ));
    }

    #[tokio::test]
    async fn final_result_schedules_a_submission() {
        let mut h = harness();

        assert!(h.controller.submit_deadline.is_none());
        h.controller
            .handle_recognition_event(final_result("rent is $2000", 0))
            .await;
        assert!(h.controller.submit_deadline.is_some());
    }

    /// Two finals in quick succession coalesce into a single submission.
    #[tokio::test]
    async fn consecutive_finals_coalesce_into_one_submission() {
        let mut h = harness();

        h.controller
            .handle_recognition_event(final_result("I earn $5000 monthly", 0))
            .await;
        h.controller
            .handle_recognition_event(final_result(" and rent is $2000", 1))
            .await;

        h.controller.run_scheduled_submission().await;

        let calls = h.advice.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "I earn $5000 monthly and rent is $2000");
        assert!(calls[0].1, "scheduled submissions are voice-originated");
        assert!(h.controller.submit_deadline.is_none());
    }

    /// Firing the scheduled submission while recording returns capture to
    /// Idle before the request goes out.
    #[tokio::test]
    async fn scheduled_submission_ends_active_capture() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;
        h.controller
            .handle_recognition_event(final_result("I earn $5000 monthly", 0))
            .await;
        h.controller.run_scheduled_submission().await;

        assert_eq!(h.controller.state, CaptureState::Idle);
        assert_eq!(h.advice.calls().len(), 1);
    }

    /// A final delivered after stop is still processed — stop and an
    /// in-flight final may be observed in either order.
    #[tokio::test]
    async fn trailing_final_after_stop_is_processed() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::StartCapture)
            .await;
        h.controller
            .handle_command(ControllerCommand::StopCapture)
            .await;
        h.controller
            .handle_recognition_event(final_result("late final", 0))
            .await;

        assert_eq!(h.controller.transcript.as_str(), "late final");
        assert!(h.controller.submit_deadline.is_some());
    }

    // -----------------------------------------------------------------------
    // Spreadsheet fetch
    // -----------------------------------------------------------------------

    async fn submit_prompt(h: &mut Harness) {
        h.controller
            .handle_command(ControllerCommand::Submit {
                text: "I earn $5000 monthly, spend $2000 on rent".into(),
                from_voice: false,
            })
            .await;
    }

    #[tokio::test]
    async fn fetch_decodes_grid_and_materialises_download() {
        let mut h = harness();
        submit_prompt(&mut h).await;

        h.controller
            .handle_command(ControllerCommand::FetchSpreadsheet)
            .await;

        // Spreadsheet request reused the submitted prompt.
        assert_eq!(
            h.sheets.calls(),
            vec!["I earn $5000 monthly, spend $2000 on rent".to_string()]
        );

        let grid = h.controller.budget.grid().expect("grid installed");
        assert_eq!(grid.row_count(), 2);
        assert_eq!(grid.rows()[0][0].value.to_string(), "A");
        assert_eq!(grid.rows()[1][1].value.to_string(), "2");

        let handle = h.controller.budget.download().expect("handle installed");
        assert!(handle.path().exists());

        let updates = drain(&mut h.updates);
        assert!(updates.iter().any(|u| matches!(
            u,
            ControllerUpdate::SpreadsheetReady { grid, .. } if grid.row_count() == 2
        )));
    }

    #[tokio::test]
    async fn fetch_without_prior_submission_is_rejected() {
        let mut h = harness();

        h.controller
            .handle_command(ControllerCommand::FetchSpreadsheet)
            .await;

        assert!(h.sheets.calls().is_empty());
        assert_eq!(h.sink.recorded().last().unwrap().title, "No budget submitted");
    }

    /// A second fetch must release the first download handle before the new
    /// one becomes active.
    #[tokio::test]
    async fn refetch_releases_previous_download_handle() {
        let mut h = harness();
        submit_prompt(&mut h).await;

        h.controller
            .handle_command(ControllerCommand::FetchSpreadsheet)
            .await;
        let first_path = h
            .controller
            .budget
            .download()
            .unwrap()
            .path()
            .to_path_buf();

        h.controller
            .handle_command(ControllerCommand::FetchSpreadsheet)
            .await;
        let second_path = h
            .controller
            .budget
            .download()
            .unwrap()
            .path()
            .to_path_buf();

        assert_ne!(first_path, second_path);
        assert!(!first_path.exists(), "old handle must be released");
        assert!(second_path.exists());
    }

    /// Decode failure clears previously displayed results instead of
    /// leaving them stale.
    #[tokio::test]
    async fn decode_failure_leaves_no_stale_grid_or_handle() {
        let mut h = harness();
        submit_prompt(&mut h).await;

        // First fetch succeeds.
        h.controller
            .handle_command(ControllerCommand::FetchSpreadsheet)
            .await;
        let old_path = h
            .controller
            .budget
            .download()
            .unwrap()
            .path()
            .to_path_buf();

        // Second fetch returns garbage bytes.
        h.controller.spreadsheet =
            Arc::new(MockSpreadsheetService::ok(b"not a workbook".to_vec()));
        h.controller
            .handle_command(ControllerCommand::FetchSpreadsheet)
            .await;

        assert!(h.controller.budget.grid().is_none());
        assert!(h.controller.budget.download().is_none());
        assert!(!old_path.exists());
        assert_eq!(
            h.sink.recorded().last().unwrap().title,
            "Could not read spreadsheet"
        );

        let updates = drain(&mut h.updates);
        assert!(updates
            .iter()
            .any(|u| matches!(u, ControllerUpdate::SheetCleared)));
    }

    // -----------------------------------------------------------------------
    // End to end through the run loop
    // -----------------------------------------------------------------------

    /// Full command-driven flow: submit typed text, receive advice, fetch a
    /// spreadsheet, end with a grid and a live download handle.
    #[tokio::test]
    async fn end_to_end_submit_then_fetch() {
        let h = harness();
        let Harness {
            controller,
            mut updates,
            events,
            sink,
            advice,
            sheets: _sheets,
            _downloads,
        } = h;

        let (command_tx, command_rx) = mpsc::channel(8);

        let task = tokio::spawn(controller.run(command_rx, events));

        command_tx
            .send(ControllerCommand::Submit {
                text: "I earn $5000 monthly, spend $2000 on rent".into(),
                from_voice: false,
            })
            .await
            .unwrap();
        command_tx
            .send(ControllerCommand::FetchSpreadsheet)
            .await
            .unwrap();
        drop(command_tx); // close channel so run() returns

        task.await.unwrap();

        assert_eq!(advice.calls().len(), 1);

        let seen = drain(&mut updates);
        let advice_ready = seen
            .iter()
            .find_map(|u| match u {
                ControllerUpdate::AdviceReady(a) => Some(a.clone()),
                _ => None,
            })
            .expect("advice displayed");
        assert_eq!(advice_ready.advice, "advice text");
        assert_eq!(advice_ready.budget_summary, "summary text");

        let download_path = seen
            .iter()
            .find_map(|u| match u {
                ControllerUpdate::SpreadsheetReady {
                    grid,
                    download_path,
                } => {
                    assert_eq!(grid.col_count(), 2);
                    Some(download_path.clone())
                }
                _ => None,
            })
            .expect("spreadsheet displayed");
        assert!(download_path.exists(), "download link must work");

        assert!(sink
            .recorded()
            .iter()
            .any(|n| n.title == "Financial advice generated!"));
    }
}
