//! External interface traits for the playback core.
//!
//! The core coordinates collaborators it does not implement: a decodable
//! audio resource provider, an analysis graph provider, and a render
//! surface. Each is a trait seam so engines can be exercised in tests with
//! in-memory implementations and in production with the `streaming` backend.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::playlist::TrackSource;
use crate::Result;

/// Lifecycle signals emitted by a live audio resource.
///
/// Signals are polled, never pushed: the single-threaded core drains them
/// once per tick, so resource backends queue internally.
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceEvent {
    /// Decode pipeline ready; duration in seconds (0.0 when unknown).
    Loaded(f64),
    /// Audio is actually audible. The engine's playing flag flips here,
    /// never at the call site of `play`.
    Started,
    /// Audio actually paused.
    Paused,
    /// Natural end of the track.
    Ended,
    /// Unrecoverable backend failure; the resource is dead.
    Failed(String),
}

/// One live decodable-audio resource.
///
/// At most one implementor instance is alive per engine at any time; the
/// engine releases the old resource before creating a new one.
pub trait AudioResource {
    /// Ask the resource to start or resume producing audio.
    fn play(&mut self);

    /// Ask the resource to pause.
    fn pause(&mut self);

    /// Stop and release underlying output. Idempotent.
    fn stop(&mut self);

    /// Seek to an absolute position in seconds (pre-clamped by the engine).
    fn seek(&mut self, seconds: f64);

    /// Apply a volume in [0, 1] (pre-clamped by the engine).
    fn set_volume(&mut self, volume: f32);

    /// Total duration in seconds, 0.0 while unknown.
    fn duration(&self) -> f64;

    /// Current playback position in seconds. Cheap; polled at ~4 Hz.
    fn position(&self) -> f64;

    /// Drain the next queued lifecycle event, if any.
    fn take_event(&mut self) -> Option<ResourceEvent>;

    /// Explicit tap capability: a handle to the decoded sample stream, or
    /// `None` when this resource cannot expose one. The analysis layer never
    /// introspects resource internals beyond this.
    fn tap_point(&self) -> Option<TapPoint>;
}

/// Factory for live audio resources.
pub trait ResourceProvider {
    /// Build one resource in streaming-decode mode with an initial volume.
    ///
    /// Failure means "unsupported source" and is non-fatal to the caller.
    fn create(&mut self, source: &TrackSource, volume: f32) -> Result<Box<dyn AudioResource>>;
}

// ============================================================================
// Tap point
// ============================================================================

/// Ring of recent decoded mono samples shared between a resource backend
/// and the analysis graph.
pub struct TapBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    /// Total samples ever pushed; 0 means decode has not produced data yet.
    pushed: u64,
}

impl TapBuffer {
    /// Create a buffer holding up to `capacity` recent samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
        }
    }

    /// Append decoded samples, discarding the oldest past capacity.
    pub fn push(&mut self, samples: &[f32]) {
        for &s in samples {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(s);
        }
        self.pushed += samples.len() as u64;
    }

    /// Copy the most recent `out.len()` samples into `out`.
    /// Returns false when fewer samples are buffered.
    pub fn latest(&self, out: &mut [f32]) -> bool {
        if self.samples.len() < out.len() {
            return false;
        }
        let start = self.samples.len() - out.len();
        for (dst, src) in out.iter_mut().zip(self.samples.iter().skip(start)) {
            *dst = *src;
        }
        true
    }

    /// Total samples pushed over the buffer's lifetime.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }
}

/// Cheap clonable handle a resource exposes for analysis tapping.
#[derive(Clone)]
pub struct TapPoint {
    /// Shared sample ring fed by the resource's decode path.
    pub buffer: Arc<Mutex<TapBuffer>>,
    /// Sample rate of the tapped stream.
    pub sample_rate: u32,
}

impl TapPoint {
    /// Create a tap point with a fresh sample ring.
    pub fn new(capacity: usize, sample_rate: u32) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(TapBuffer::new(capacity))),
            sample_rate,
        }
    }

    /// Whether the decode path has produced any samples yet.
    pub fn is_ready(&self) -> bool {
        self.buffer.lock().total_pushed() > 0
    }
}

// ============================================================================
// Analysis graph provider
// ============================================================================

/// Why a tap attach attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachFailure {
    /// Decode not ready yet; retry on the next play-state transition.
    NotReady,
    /// The graph cannot be built for this resource at all.
    Unsupported,
}

/// Analysis graph provider: builds a tap against a [`TapPoint`] and reads
/// frequency-bin magnitudes from it.
///
/// One instance is shared for the tap's whole lifetime and reused across
/// sessions; only [`AnalysisSource::close`] tears it down.
pub trait AnalysisSource {
    /// Attempt to route the tapped stream into the analyser.
    ///
    /// Must not break the audible output path: tapping is a mirror, never a
    /// detour. A `NotReady` failure is retryable and leaves no partial state.
    fn try_attach(&mut self, point: &TapPoint) -> std::result::Result<(), AttachFailure>;

    /// Fill `out` with current byte magnitudes per frequency bin.
    /// Returns false when no attached graph can produce data.
    fn read_magnitudes(&mut self, out: &mut [u8]) -> bool;

    /// Disconnect tap routing. Idempotent; the analyser itself survives.
    fn disconnect(&mut self);

    /// Tear the whole graph down. Idempotent.
    fn close(&mut self);
}

// ============================================================================
// Render surface
// ============================================================================

/// Opaque draw target for the visualization loop.
pub trait RenderSurface {
    /// Surface size in drawing units (width, height).
    fn size(&self) -> (f32, f32);

    /// Paint the background before a frame's bars.
    fn clear(&mut self);

    /// Draw one filled vertical bar anchored at the bottom edge.
    fn fill_bar(&mut self, x: f32, width: f32, height: f32, color: crate::viz::BarColor);

    /// Present the finished frame. Default is a no-op for immediate surfaces.
    fn present(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_buffer_keeps_latest_samples() {
        let mut buf = TapBuffer::new(4);
        buf.push(&[1.0, 2.0]);
        let mut out = [0.0f32; 3];
        assert!(!buf.latest(&mut out));

        buf.push(&[3.0, 4.0, 5.0]);
        assert_eq!(buf.total_pushed(), 5);
        assert!(buf.latest(&mut out));
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn tap_point_readiness_tracks_decode_progress() {
        let point = TapPoint::new(8, 44_100);
        assert!(!point.is_ready());
        point.buffer.lock().push(&[0.0]);
        assert!(point.is_ready());
    }
}
