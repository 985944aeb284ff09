//! budgetvoice — voice-driven budgeting assistant.
//!
//! The user describes their financial situation by voice or text, receives
//! AI-generated advice plus a budget summary from the advice service, and can
//! fetch a budget spreadsheet that is decoded into a grid for display along
//! with a local download handle.
//!
//! # Architecture
//!
//! ```text
//! Microphone → RecognitionSession ──RecognitionEvent──▶ VoiceCaptureController
//!                                                           │        │
//!                 TranscriptBuffer ◀── finals ──────────────┘        │
//!                                                                    ▼
//!          egui app ◀──ControllerUpdate── controller ──▶ AdviceService (HTTP)
//!                  ◀──Notification──────            ──▶ SpreadsheetService (HTTP)
//!                                                            │
//!                                          SheetGrid + DownloadHandle
//! ```
//!
//! The controller runs as a tokio task and owns all mutable capture state;
//! the UI mirrors it through mpsc channels.

pub mod app;
pub mod audio;
pub mod budget;
pub mod config;
pub mod notify;
pub mod services;
pub mod sheet;
pub mod speech;
