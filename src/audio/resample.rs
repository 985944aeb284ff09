//! Channel downmix and 16 kHz resampling.
//!
//! The recognition engine consumes 16 kHz mono `f32` PCM.  Capture devices
//! commonly deliver 44.1/48 kHz stereo, so every chunk passes through
//! [`downmix_to_mono`] and [`resample_to_16k`] before accumulation.
//!
//! Linear interpolation is sufficient here: the signal is immediately
//! consumed by a speech model that is robust to mild aliasing, and the
//! downsampling ratio from common device rates is small.

/// Target sample rate required by the recognition engine.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Collapse interleaved multi-channel samples to mono by averaging frames.
///
/// A partial trailing frame (malformed input) is dropped.  `channels == 1`
/// returns the input unchanged as an owned vector.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    let frames = samples.len() / channels;
    let mut mono = Vec::with_capacity(frames);

    for frame in 0..frames {
        let start = frame * channels;
        let sum: f32 = samples[start..start + channels].iter().sum();
        mono.push(sum / channels as f32);
    }

    mono
}

/// Resample mono audio from `source_rate` to 16 kHz via linear interpolation.
///
/// Returns the input unchanged when `source_rate` is already 16 kHz.
/// An empty input yields an empty output.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == TARGET_SAMPLE_RATE || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / TARGET_SAMPLE_RATE as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let a = samples[idx];
        let b = if idx + 1 < samples.len() {
            samples[idx + 1]
        } else {
            a
        };

        out.push(a + (b - a) * frac);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn stereo_downmix_averages_pairs() {
        let samples = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix_to_mono(&samples, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let samples = vec![1.0, 0.0, 0.5]; // 1.5 stereo frames
        let mono = downmix_to_mono(&samples, 2);
        assert_eq!(mono.len(), 1);
    }

    #[test]
    fn same_rate_passthrough() {
        let samples = vec![0.1_f32; 160];
        assert_eq!(resample_to_16k(&samples, 16_000), samples);
    }

    #[test]
    fn downsample_halves_length() {
        let samples = vec![0.25_f32; 3_200]; // 100 ms @ 32 kHz
        let out = resample_to_16k(&samples, 32_000);
        assert_eq!(out.len(), 1_600); // 100 ms @ 16 kHz
    }

    #[test]
    fn downsample_preserves_constant_signal() {
        let samples = vec![0.5_f32; 4_800];
        let out = resample_to_16k(&samples, 48_000);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(resample_to_16k(&[], 48_000).is_empty());
        assert!(downmix_to_mono(&[], 2).is_empty());
    }
}
