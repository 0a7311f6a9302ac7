//! Wavedeck - audio playback and real-time spectrum visualization engine.
//!
//! Drives gapless single-track playback with transport controls, taps the
//! live decoded signal for frequency analysis, and renders a continuously
//! updating bar visualization that degrades gracefully to a synthetic
//! animation whenever real analysis data is unavailable.
//!
//! # Components
//! - [`engine::PlaybackEngine`] - owns the single live playback session
//! - [`tap::SignalTap`] - best-effort analyser attachment with rebinding
//! - [`viz::VisualizationLoop`] - single-flight bar rendering loop
//! - [`sequencer`] - pure next/previous track selection under shuffle/repeat
//! - [`player::Player`] - controller wiring the components together
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real audio output and FFT analysis (enables
//!   optional `rodio` and `realfft` deps)
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "streaming")]
//! # {
//! use wavedeck::backend::{FftAnalyzer, RodioProvider};
//! use wavedeck::playlist::{Track, TrackSource};
//! use wavedeck::player::Player;
//!
//! let provider = RodioProvider::new().unwrap();
//! let mut player = Player::new(Box::new(provider), Box::new(|| Box::new(FftAnalyzer::new())));
//! player.queue(Track::new(0, "Demo", "Unknown", TrackSource::path("song.flac")));
//! player.play_track_at(0);
//! // drive player.tick(now, surface) from the host loop
//! # }
//! ```

#![warn(missing_docs)]

pub mod config; // Player configuration
pub mod engine; // Playback Engine (session ownership, transport)
pub mod player; // Controller wiring engine, tap, viz and sequencer
pub mod playlist; // Track data model and playlist state
pub mod poll; // Rate-limited position polling
pub mod resource; // External interface traits (resource, analysis, surface)
pub mod sequencer; // Pure next/previous selection logic
pub mod tap; // Signal Tap (analysis binding lifecycle)
pub mod viz; // Visualization Loop (bar rendering)

#[cfg(feature = "streaming")]
pub mod backend; // Rodio resource provider and FFT analyser

/// Error types for playback and visualization operations
#[derive(thiserror::Error, Debug)]
pub enum WavedeckError {
    /// Audio resource creation or control failure
    #[error("Resource error: {0}")]
    Resource(String),

    /// Analysis graph construction failure
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for WavedeckError {
    fn from(msg: String) -> Self {
        WavedeckError::Other(msg)
    }
}

impl From<&str> for WavedeckError {
    fn from(msg: &str) -> Self {
        WavedeckError::Other(msg.to_string())
    }
}

/// Result type for playback and visualization operations
pub type Result<T> = std::result::Result<T, WavedeckError>;

// ============================================================================
// Analysis and rendering constants
// ============================================================================

/// Transform size of the frequency analyser (fixed at binding creation).
pub const FFT_SIZE: usize = 512;

/// Usable frequency bins produced by the analyser (FFT_SIZE / 2).
pub const FREQ_BINS: usize = 256;

/// Exponential smoothing factor applied to successive analyser frames.
pub const ANALYSER_SMOOTHING: f32 = 0.8;

/// Number of bars in the rendered visualization.
pub const BAR_COUNT: usize = 96;

/// Horizontal spacing between bars, in surface units.
pub const BAR_GAP: f32 = 2.0;

/// Fraction of surface height used by bars driven by real analysis data.
pub const REAL_HEIGHT_SCALE: f32 = 0.85;

/// Fraction of surface height used by the synthetic fallback animation.
pub const FALLBACK_HEIGHT_SCALE: f32 = 0.4;

/// Minimum interval between position publications, in seconds (~4 Hz).
pub const POSITION_POLL_INTERVAL: f64 = 0.25;

// Public API exports
pub use config::PlayerConfig;
pub use engine::{EngineEvent, PlaybackEngine, SessionId};
pub use player::Player;
pub use playlist::{PlaylistState, Repeat, Track, TrackSource};
pub use resource::{
    AnalysisSource, AttachFailure, AudioResource, RenderSurface, ResourceEvent, ResourceProvider,
    TapPoint,
};
pub use tap::SignalTap;
pub use viz::{BarColor, VisualizationFrame, VisualizationLoop};

#[cfg(feature = "streaming")]
pub use backend::{FftAnalyzer, RodioProvider};
