//! Energy-based silence detection.
//!
//! [`SilenceDetector`] classifies 30 ms frames of 16 kHz mono audio as voice
//! or silence by RMS amplitude.  The recognition session uses it for two
//! separate signals:
//!
//! * an **utterance boundary** — enough trailing silence after voice to
//!   finalize the current hypothesis, and
//! * **speech end** — a long stretch with no voice at all, after which the
//!   session deactivates (the platform "no audio detected" signal).

// ---------------------------------------------------------------------------
// SilenceDetector
// ---------------------------------------------------------------------------

/// Frame-level voice/silence classifier.
///
/// # Example
///
/// ```rust
/// use budgetvoice::audio::SilenceDetector;
///
/// // 0.01 RMS threshold — typical for a quiet room
/// let detector = SilenceDetector::new(0.01);
///
/// assert!(!detector.is_voice(&vec![0.0_f32; 480]));
/// assert!(detector.is_voice(&vec![0.5_f32; 480]));
/// ```
pub struct SilenceDetector {
    /// RMS amplitude threshold; frames below this are considered silence.
    rms_threshold: f32,
    /// Frame size in samples.  480 samples = 30 ms at 16 kHz.
    frame_size: usize,
}

impl SilenceDetector {
    /// Frame length used for classification, in samples at 16 kHz.
    pub const FRAME_SAMPLES: usize = 480;

    /// Create a [`SilenceDetector`] with the given RMS threshold.
    ///
    /// `rms_threshold` should be in `[0.0, 1.0]`.  A typical value is
    /// `0.01` for quiet microphones; use `0.02`–`0.05` in noisy environments.
    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            frame_size: Self::FRAME_SAMPLES,
        }
    }

    /// RMS threshold currently in use.
    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    /// Returns `true` when the frame contains voice activity.
    pub fn is_voice(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_sq: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }

    /// Number of trailing samples in `audio` that contain no voice.
    ///
    /// Scans whole frames from the end; the (possibly partial) final frame
    /// is included.  Returns `audio.len()` when the entire buffer is silent.
    pub fn trailing_silence(&self, audio: &[f32]) -> usize {
        if audio.is_empty() {
            return 0;
        }

        let mut end = audio.len();
        loop {
            let start = end.saturating_sub(self.frame_size);
            if self.is_voice(&audio[start..end]) {
                return audio.len() - end;
            }
            if start == 0 {
                return audio.len();
            }
            end = start;
        }
    }

    /// Returns `true` when any frame in `audio` contains voice.
    pub fn contains_voice(&self, audio: &[f32]) -> bool {
        audio
            .chunks(self.frame_size)
            .any(|frame| self.is_voice(frame))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: usize = SilenceDetector::FRAME_SAMPLES;

    fn voiced(frames: usize) -> Vec<f32> {
        vec![0.5_f32; frames * FRAME]
    }

    fn silent(frames: usize) -> Vec<f32> {
        vec![0.0_f32; frames * FRAME]
    }

    #[test]
    fn silent_frame_is_not_voice() {
        let detector = SilenceDetector::new(0.01);
        assert!(!detector.is_voice(&silent(1)));
    }

    #[test]
    fn loud_frame_is_voice() {
        let detector = SilenceDetector::new(0.01);
        assert!(detector.is_voice(&voiced(1)));
    }

    #[test]
    fn empty_frame_is_not_voice() {
        let detector = SilenceDetector::new(0.01);
        assert!(!detector.is_voice(&[]));
    }

    #[test]
    fn trailing_silence_counts_from_end() {
        let detector = SilenceDetector::new(0.01);
        let mut audio = voiced(2);
        audio.extend(silent(3));
        assert_eq!(detector.trailing_silence(&audio), 3 * FRAME);
    }

    #[test]
    fn trailing_silence_zero_when_voice_at_end() {
        let detector = SilenceDetector::new(0.01);
        let mut audio = silent(2);
        audio.extend(voiced(1));
        assert_eq!(detector.trailing_silence(&audio), 0);
    }

    #[test]
    fn all_silent_buffer_reports_full_length() {
        let detector = SilenceDetector::new(0.01);
        let audio = silent(4);
        assert_eq!(detector.trailing_silence(&audio), audio.len());
    }

    #[test]
    fn contains_voice_finds_mid_buffer_speech() {
        let detector = SilenceDetector::new(0.01);
        let mut audio = silent(2);
        audio.extend(voiced(1));
        audio.extend(silent(2));
        assert!(detector.contains_voice(&audio));
        assert!(!detector.contains_voice(&silent(5)));
    }

    #[test]
    fn threshold_getter() {
        let detector = SilenceDetector::new(0.05);
        assert!((detector.threshold() - 0.05).abs() < 1e-7);
    }
}
