//! Budget form and results view — egui/eframe application.
//!
//! # Architecture
//!
//! [`BudgetVoiceApp`] is the top-level [`eframe::App`].  It owns the UI
//! state and three channel endpoints:
//!
//! * `command_tx` — sends [`ControllerCommand`] to the controller task.
//! * `update_rx`  — receives [`ControllerUpdate`] mirroring controller
//!   state.
//! * `notify_rx`  — receives [`Notification`]s rendered as transient
//!   toasts.
//!
//! The editor text, interim line, advice panel and spreadsheet grid are all
//! mirrors: the controller owns the real state and the UI re-renders
//! whatever it last heard.  While capture is active the editor is disabled,
//! so the recognition handler stays the transcript's single writer.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::mpsc;

use crate::budget::{CaptureState, ControllerCommand, ControllerUpdate};
use crate::config::AppConfig;
use crate::notify::{Notification, Severity};
use crate::services::FinancialAdvice;
use crate::sheet::SheetGrid;

// ---------------------------------------------------------------------------
// BudgetVoiceApp
// ---------------------------------------------------------------------------

/// The budgeting window: prompt form, voice controls, advice panel and
/// spreadsheet viewer.
pub struct BudgetVoiceApp {
    // ── Form state ───────────────────────────────────────────────────────
    /// Editor content.  Mirrors the transcript buffer during capture; free
    /// text otherwise.
    prompt: String,
    /// Live interim hypothesis shown below the editor while recording.
    interim: Option<String>,
    /// Whether the current prompt text originated from voice capture.
    from_voice: bool,
    /// Capture state as last reported by the controller.
    capture_state: CaptureState,
    /// An advice request is in flight.
    loading: bool,

    // ── Results ──────────────────────────────────────────────────────────
    advice: Option<FinancialAdvice>,
    grid: Option<SheetGrid>,
    download_path: Option<PathBuf>,

    // ── Toasts ───────────────────────────────────────────────────────────
    toasts: Vec<(Notification, Instant)>,
    toast_ttl: Duration,

    // ── Channels ─────────────────────────────────────────────────────────
    command_tx: mpsc::Sender<ControllerCommand>,
    update_rx: mpsc::Receiver<ControllerUpdate>,
    notify_rx: mpsc::UnboundedReceiver<Notification>,
}

impl BudgetVoiceApp {
    pub fn new(
        config: &AppConfig,
        command_tx: mpsc::Sender<ControllerCommand>,
        update_rx: mpsc::Receiver<ControllerUpdate>,
        notify_rx: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        Self {
            prompt: String::new(),
            interim: None,
            from_voice: false,
            capture_state: CaptureState::Idle,
            loading: false,
            advice: None,
            grid: None,
            download_path: None,
            toasts: Vec::new(),
            toast_ttl: Duration::from_secs(config.ui.toast_secs),
            command_tx,
            update_rx,
            notify_rx,
        }
    }

    fn is_recording(&self) -> bool {
        self.capture_state == CaptureState::Recording
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending controller updates (non-blocking).
    fn poll_updates(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            match update {
                ControllerUpdate::StateChanged(state) => {
                    self.capture_state = state;
                }
                ControllerUpdate::TranscriptChanged { text } => {
                    self.from_voice = !text.is_empty();
                    self.prompt = text;
                }
                ControllerUpdate::InterimChanged { text } => {
                    self.interim = text;
                }
                ControllerUpdate::SubmissionStarted => {
                    self.loading = true;
                }
                ControllerUpdate::AdviceReady(advice) => {
                    self.advice = Some(advice);
                    self.loading = false;
                }
                ControllerUpdate::SheetCleared => {
                    self.grid = None;
                    self.download_path = None;
                }
                ControllerUpdate::SpreadsheetReady {
                    grid,
                    download_path,
                } => {
                    self.grid = Some(grid);
                    self.download_path = Some(download_path);
                }
            }
        }
    }

    /// Drain all pending notifications (non-blocking).
    fn poll_notifications(&mut self) {
        while let Ok(notification) = self.notify_rx.try_recv() {
            // An error ends any visible loading state.
            if notification.severity == Severity::Error {
                self.loading = false;
            }
            self.toasts.push((notification, Instant::now()));
        }
    }

    fn expire_toasts(&mut self) {
        let ttl = self.toast_ttl;
        self.toasts.retain(|(_, shown)| shown.elapsed() < ttl);
    }

    fn send(&self, command: ControllerCommand) {
        if self.command_tx.try_send(command).is_err() {
            log::warn!("controller command channel full or closed");
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_form(&mut self, ui: &mut egui::Ui) {
        ui.label("Describe your financial situation");
        ui.add_space(4.0);

        let editor_enabled = !self.loading && !self.is_recording();
        let editor = egui::TextEdit::multiline(&mut self.prompt)
            .desired_rows(6)
            .desired_width(f32::INFINITY)
            .hint_text("Include your income, expenses, financial goals, and concerns...");
        let response = ui.add_enabled(editor_enabled, editor);
        if response.changed() {
            // Manual edits make it a typed submission again.
            self.from_voice = false;
        }

        if let Some(interim) = &self.interim {
            ui.label(
                egui::RichText::new(format!("… {interim}"))
                    .italics()
                    .color(egui::Color32::from_rgb(130, 130, 130)),
            );
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if self.is_recording() {
                if ui.button("⏹ Stop recording").clicked() {
                    self.send(ControllerCommand::StopCapture);
                }
                ui.label(
                    egui::RichText::new("Listening…")
                        .color(egui::Color32::from_rgb(220, 80, 80)),
                );
            } else if ui
                .add_enabled(!self.loading, egui::Button::new("🎤 Voice input"))
                .clicked()
            {
                self.send(ControllerCommand::StartCapture);
            }

            let can_submit =
                !self.loading && !self.is_recording() && !self.prompt.trim().is_empty();
            if ui
                .add_enabled(can_submit, egui::Button::new("Generate budget plan"))
                .clicked()
            {
                self.send(ControllerCommand::Submit {
                    text: self.prompt.clone(),
                    from_voice: self.from_voice,
                });
            }

            if self.loading {
                ui.spinner();
                ui.label("Processing…");
            }
        });
    }

    fn draw_advice(&mut self, ui: &mut egui::Ui) {
        let Some(advice) = self.advice.clone() else {
            return;
        };

        ui.add_space(12.0);
        ui.group(|ui| {
            ui.heading("Financial Advice");
            ui.add_space(4.0);
            ui.label(&advice.advice);
            ui.add_space(8.0);
            ui.heading("Budget Summary");
            ui.add_space(4.0);
            ui.label(&advice.budget_summary);
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                if ui.button("Copy advice").clicked() {
                    copy_to_clipboard(&advice.advice);
                }
                if ui
                    .add_enabled(!self.loading, egui::Button::new("⬇ Get budget spreadsheet"))
                    .clicked()
                {
                    self.send(ControllerCommand::FetchSpreadsheet);
                }
            });
        });
    }

    fn draw_spreadsheet(&mut self, ui: &mut egui::Ui) {
        let Some(grid) = self.grid.clone() else {
            return;
        };

        ui.add_space(12.0);
        ui.group(|ui| {
            ui.heading("Your Budget Spreadsheet");
            ui.add_space(6.0);

            egui::ScrollArea::both()
                .max_height(280.0)
                .show(ui, |ui| {
                    egui::Grid::new("budget_sheet")
                        .striped(true)
                        .min_col_width(80.0)
                        .show(ui, |ui| {
                            for row in grid.rows() {
                                for cell in row {
                                    ui.label(cell.value.to_string());
                                }
                                ui.end_row();
                            }
                        });
                });

            if let Some(path) = self.download_path.clone() {
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.label("Saved to:");
                    ui.monospace(path.display().to_string());
                    if ui.button("Copy path").clicked() {
                        copy_to_clipboard(&path.display().to_string());
                    }
                });
            }
        });
    }

    fn draw_toasts(&mut self, ctx: &egui::Context) {
        if self.toasts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 12.0))
            .show(ctx, |ui| {
                for (toast, _) in &self.toasts {
                    let accent = match toast.severity {
                        Severity::Info => egui::Color32::from_rgb(90, 140, 220),
                        Severity::Success => egui::Color32::from_rgb(90, 180, 110),
                        Severity::Error => egui::Color32::from_rgb(220, 90, 90),
                    };
                    egui::Frame::popup(&ctx.style()).show(ui, |ui| {
                        ui.set_max_width(280.0);
                        ui.label(egui::RichText::new(&toast.title).strong().color(accent));
                        if !toast.description.is_empty() {
                            ui.label(&toast.description);
                        }
                    });
                    ui.add_space(6.0);
                }
            });
    }
}

impl eframe::App for BudgetVoiceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_updates();
        self.poll_notifications();
        self.expire_toasts();

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(8.0);
                ui.heading("Create Your Personalized Budget");
                ui.label(
                    "Describe your financial situation, income, expenses, and goals. \
                     A personalized budget plan and financial advice will be generated.",
                );
                ui.add_space(12.0);

                self.draw_form(ui);
                self.draw_advice(ui);
                self.draw_spreadsheet(ui);
            });
        });

        self.draw_toasts(ctx);

        // Channels are polled from this loop, so keep repainting while idle.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

// ---------------------------------------------------------------------------
// Clipboard helper
// ---------------------------------------------------------------------------

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text.to_string()) {
                log::warn!("clipboard write failed: {e}");
            }
        }
        Err(e) => log::warn!("clipboard unavailable: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Cell;

    fn make_app() -> (
        BudgetVoiceApp,
        mpsc::Receiver<ControllerCommand>,
        mpsc::Sender<ControllerUpdate>,
        mpsc::UnboundedSender<Notification>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (update_tx, update_rx) = mpsc::channel(8);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let app = BudgetVoiceApp::new(&AppConfig::default(), command_tx, update_rx, notify_rx);
        (app, command_rx, update_tx, notify_tx)
    }

    #[test]
    fn transcript_update_mirrors_into_prompt() {
        let (mut app, _cmds, updates, _notify) = make_app();

        updates
            .try_send(ControllerUpdate::TranscriptChanged {
                text: "I earn $5000 monthly".into(),
            })
            .unwrap();
        app.poll_updates();

        assert_eq!(app.prompt, "I earn $5000 monthly");
        assert!(app.from_voice);
    }

    #[test]
    fn advice_ready_ends_loading() {
        let (mut app, _cmds, updates, _notify) = make_app();

        updates.try_send(ControllerUpdate::SubmissionStarted).unwrap();
        app.poll_updates();
        assert!(app.loading);

        updates
            .try_send(ControllerUpdate::AdviceReady(FinancialAdvice {
                advice: "save".into(),
                budget_summary: "summary".into(),
            }))
            .unwrap();
        app.poll_updates();

        assert!(!app.loading);
        assert_eq!(app.advice.as_ref().unwrap().advice, "save");
    }

    #[test]
    fn sheet_cleared_drops_grid_and_path() {
        let (mut app, _cmds, updates, _notify) = make_app();

        updates
            .try_send(ControllerUpdate::SpreadsheetReady {
                grid: SheetGrid::new(vec![vec![Cell::text("A")]]),
                download_path: PathBuf::from("/tmp/budget-1.xlsx"),
            })
            .unwrap();
        app.poll_updates();
        assert!(app.grid.is_some());
        assert!(app.download_path.is_some());

        updates.try_send(ControllerUpdate::SheetCleared).unwrap();
        app.poll_updates();
        assert!(app.grid.is_none());
        assert!(app.download_path.is_none());
    }

    #[test]
    fn error_notification_ends_loading_and_shows_toast() {
        let (mut app, _cmds, updates, notify) = make_app();

        updates.try_send(ControllerUpdate::SubmissionStarted).unwrap();
        app.poll_updates();

        notify
            .send(Notification::error("Failed to generate advice", "boom"))
            .unwrap();
        app.poll_notifications();

        assert!(!app.loading);
        assert_eq!(app.toasts.len(), 1);
        assert_eq!(app.toasts[0].0.title, "Failed to generate advice");
    }

    #[test]
    fn interim_update_is_display_only() {
        let (mut app, _cmds, updates, _notify) = make_app();

        updates
            .try_send(ControllerUpdate::InterimChanged {
                text: Some("I ea".into()),
            })
            .unwrap();
        app.poll_updates();

        assert_eq!(app.interim.as_deref(), Some("I ea"));
        assert_eq!(app.prompt, "", "interim text never reaches the editor");
    }
}
