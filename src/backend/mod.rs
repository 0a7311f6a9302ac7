//! Streaming backend: real audio output via rodio plus FFT analysis.
//!
//! Everything here is gated behind the `streaming` feature so the core stays
//! buildable (and testable) on machines without an audio device.

mod fft;
mod output;

pub use fft::FftAnalyzer;
pub use output::RodioProvider;
