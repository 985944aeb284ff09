//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the advice / spreadsheet backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the backend, without a trailing slash
    /// (e.g. `http://localhost:8080`).
    pub base_url: String,
    /// API key — `None` for backends that require no authentication.
    pub api_key: Option<String>,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-recognition session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// GGML model name / file stem (e.g. `"base.en"`).
    pub model: String,
    /// Recognition language as a BCP-47 tag. The engine uses the primary
    /// subtag (`"en-US"` → `"en"`).
    pub language: String,
    /// Keep the session open across pauses instead of stopping after the
    /// first utterance.
    pub continuous: bool,
    /// Surface provisional hypotheses before finalization.
    pub interim_results: bool,
    /// Milliseconds after a finalized result before the transcript is
    /// submitted to the advice service. A newer final result within the
    /// window reschedules the submission.
    pub submit_delay_ms: u64,
    /// Milliseconds of silence that close the current utterance and
    /// finalize its hypothesis.
    pub utterance_silence_ms: u64,
    /// Milliseconds without any detected voice after which the session
    /// signals speech end and deactivates.
    pub end_silence_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "base.en".into(),
            language: "en-US".into(),
            continuous: true,
            interim_results: true,
            submit_delay_ms: 1_000,
            utterance_silence_ms: 900,
            end_silence_ms: 8_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and silence detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz fed to the recognition engine (must be 16 000).
    pub sample_rate: u32,
    /// RMS amplitude threshold; frames below this level count as silence.
    pub rms_threshold: f32,
    /// Milliseconds of fresh audio between interim decode passes.
    pub interim_interval_ms: u64,
    /// Audio input device name — `None` means the system default.
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            rms_threshold: 0.01,
            interim_interval_ms: 1_200,
            input_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Window appearance and behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Last saved window position `(x, y)` in screen pixels.  `None` means
    /// let the OS / window manager pick a position on first launch.
    pub window_position: Option<(f32, f32)>,
    /// Seconds a toast notification stays on screen.
    pub toast_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            toast_secs: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use budgetvoice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend connection settings.
    pub service: ServiceConfig,
    /// Speech-recognition session settings.
    pub speech: SpeechConfig,
    /// Microphone / silence-detection settings.
    pub audio: AudioConfig,
    /// Window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
