//! Budgeting core — the voice-capture controller and its owned state.
//!
//! [`VoiceCaptureController`] is the single writer for everything here: the
//! transcript buffer, the capture state machine, and the advice/spreadsheet
//! results held in [`BudgetSession`].  The UI reads it all through
//! [`ControllerUpdate`] messages.

pub mod controller;
pub mod session;
pub mod transcript;

pub use controller::{
    CaptureState, ControllerCommand, ControllerUpdate, VoiceCaptureController,
};
pub use session::BudgetSession;
pub use transcript::TranscriptBuffer;
