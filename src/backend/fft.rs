//! FFT analyser over a tap ring.
//!
//! Reads the most recent window of decoded mono samples, applies a Hann
//! window and a forward real FFT, then folds successive frames with
//! exponential smoothing and maps the result onto byte magnitudes through a
//! fixed decibel range.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::resource::{AnalysisSource, AttachFailure, TapPoint};
use crate::{ANALYSER_SMOOTHING, FFT_SIZE, FREQ_BINS};

/// Decibel mapped to byte magnitude 0.
const MIN_DECIBELS: f32 = -100.0;

/// Decibel mapped to byte magnitude 255.
const MAX_DECIBELS: f32 = -30.0;

/// Frequency analyser bound to at most one tap point at a time.
///
/// The FFT plan and its buffers live for the analyser's whole lifetime and
/// are reused across sessions; only the binding and the smoothing state
/// reset on reattach.
pub struct FftAnalyzer {
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    window: Vec<f32>,
    /// Exponentially smoothed linear magnitudes, one per usable bin.
    smoothed: [f32; FREQ_BINS],
    samples: [f32; FFT_SIZE],
    point: Option<TapPoint>,
    closed: bool,
}

impl FftAnalyzer {
    /// Build the analyser and its fixed-size FFT plan.
    pub fn new() -> Self {
        let plan = RealFftPlanner::new().plan_fft_forward(FFT_SIZE);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let window = (0..FFT_SIZE).map(|i| hann_value(i, FFT_SIZE)).collect();
        Self {
            plan,
            input,
            spectrum,
            scratch,
            window,
            smoothed: [0.0; FREQ_BINS],
            samples: [0.0; FFT_SIZE],
            point: None,
            closed: false,
        }
    }
}

impl Default for FftAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSource for FftAnalyzer {
    fn try_attach(&mut self, point: &TapPoint) -> std::result::Result<(), AttachFailure> {
        if self.closed {
            return Err(AttachFailure::Unsupported);
        }
        // Decode must have produced data first, else the window would be
        // all-zero and every read would report silence as real data.
        if !point.is_ready() {
            return Err(AttachFailure::NotReady);
        }
        self.point = Some(point.clone());
        self.smoothed = [0.0; FREQ_BINS];
        Ok(())
    }

    fn read_magnitudes(&mut self, out: &mut [u8]) -> bool {
        let Some(point) = self.point.as_ref() else {
            return false;
        };
        if !point.buffer.lock().latest(&mut self.samples) {
            return false;
        }

        for (dst, (&s, &w)) in self
            .input
            .iter_mut()
            .zip(self.samples.iter().zip(self.window.iter()))
        {
            *dst = s * w;
        }
        if self
            .plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .is_err()
        {
            return false;
        }

        let norm = 2.0 / FFT_SIZE as f32;
        for (i, byte) in out.iter_mut().enumerate().take(FREQ_BINS) {
            let magnitude = self.spectrum[i].norm() * norm;
            let smoothed =
                ANALYSER_SMOOTHING * self.smoothed[i] + (1.0 - ANALYSER_SMOOTHING) * magnitude;
            self.smoothed[i] = smoothed;

            let db = 20.0 * smoothed.max(f32::MIN_POSITIVE).log10();
            let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
            *byte = (scaled.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        true
    }

    fn disconnect(&mut self) {
        self.point = None;
    }

    fn close(&mut self) {
        self.disconnect();
        self.closed = true;
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
