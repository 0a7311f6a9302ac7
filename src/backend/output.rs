//! Rodio-backed resource provider.
//!
//! Each created resource owns one [`Sink`] fed by a decoder wrapped in a
//! [`TappedSource`], which mirrors the decoded stream into a shared sample
//! ring as it flows to the output device. Tapping is a mirror on the decode
//! path; a failed or absent analyser never affects the audible output.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::debug;

use crate::playlist::TrackSource;
use crate::resource::{AudioResource, ResourceEvent, ResourceProvider, TapPoint};
use crate::{Result, WavedeckError, FFT_SIZE};

/// Mono samples the tap ring retains; enough history for several analysis
/// reads between decode batches.
const TAP_RING_CAPACITY: usize = FFT_SIZE * 4;

/// Samples accumulated locally before taking the ring lock.
const TAP_FLUSH_BATCH: usize = 512;

/// Source adapter that mirrors the decoded stream into a tap ring.
///
/// Interleaved channels are folded to mono (frame average) before the push,
/// so ring sample counts are in mono frames regardless of channel layout.
struct TappedSource<S> {
    inner: S,
    channels: u16,
    point: TapPoint,
    /// Partial frame being folded.
    frame_sum: f32,
    frame_fill: u16,
    /// Locally batched mono samples awaiting a ring push.
    pending: Vec<f32>,
}

impl<S> TappedSource<S>
where
    S: Source<Item = f32>,
{
    fn new(inner: S, point: TapPoint) -> Self {
        let channels = inner.channels();
        Self {
            inner,
            channels,
            point,
            frame_sum: 0.0,
            frame_fill: 0,
            pending: Vec::with_capacity(TAP_FLUSH_BATCH),
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.point.buffer.lock().push(&self.pending);
            self.pending.clear();
        }
    }
}

impl<S> Iterator for TappedSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let Some(sample) = self.inner.next() else {
            self.flush();
            return None;
        };

        self.frame_sum += sample;
        self.frame_fill += 1;
        if self.frame_fill == self.channels {
            self.pending.push(self.frame_sum / self.channels as f32);
            self.frame_sum = 0.0;
            self.frame_fill = 0;
            if self.pending.len() >= TAP_FLUSH_BATCH {
                self.flush();
            }
        }
        Some(sample)
    }
}

impl<S> Source for TappedSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> std::result::Result<(), SeekError> {
        // Drop the partial frame so folding stays aligned after the jump.
        self.pending.clear();
        self.frame_sum = 0.0;
        self.frame_fill = 0;
        self.inner.try_seek(pos)
    }
}

/// One file-backed playback resource on a rodio sink.
struct RodioResource {
    sink: Sink,
    tap: TapPoint,
    duration: f64,
    events: VecDeque<ResourceEvent>,
    started: bool,
    ended: bool,
    stopped: bool,
}

impl AudioResource for RodioResource {
    fn play(&mut self) {
        if self.stopped || self.ended {
            return;
        }
        self.sink.play();
        self.started = true;
        self.events.push_back(ResourceEvent::Started);
    }

    fn pause(&mut self) {
        if self.stopped || self.ended {
            return;
        }
        self.sink.pause();
        self.events.push_back(ResourceEvent::Paused);
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.sink.stop();
        }
    }

    fn seek(&mut self, seconds: f64) {
        if self.stopped {
            return;
        }
        if let Err(err) = self.sink.try_seek(Duration::from_secs_f64(seconds)) {
            debug!(%err, "seek unsupported for this source");
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn position(&self) -> f64 {
        self.sink.get_pos().as_secs_f64()
    }

    fn take_event(&mut self) -> Option<ResourceEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        // Natural end: the sink drained everything after playback started.
        if self.started && !self.ended && !self.stopped && self.sink.empty() {
            self.ended = true;
            return Some(ResourceEvent::Ended);
        }
        None
    }

    fn tap_point(&self) -> Option<TapPoint> {
        Some(self.tap.clone())
    }
}

impl Drop for RodioResource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resource provider over the default system audio device.
///
/// Owns the output stream for its whole lifetime; sinks for individual
/// tracks are created and dropped per session.
pub struct RodioProvider {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioProvider {
    /// Open the default audio output device.
    pub fn new() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| WavedeckError::Resource(format!("failed to open audio output: {e}")))?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl ResourceProvider for RodioProvider {
    fn create(&mut self, source: &TrackSource, volume: f32) -> Result<Box<dyn AudioResource>> {
        let path = match source {
            TrackSource::File(path) => path,
            TrackSource::Url(url) => {
                return Err(WavedeckError::Resource(format!(
                    "remote sources are not supported by this provider: {url}"
                )));
            }
        };

        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| WavedeckError::Resource(format!("failed to decode {}: {e}", path.display())))?;

        let duration = decoder
            .total_duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let sample_rate = decoder.sample_rate();
        let tap = TapPoint::new(TAP_RING_CAPACITY, sample_rate);
        let tapped = TappedSource::new(decoder.convert_samples::<f32>(), tap.clone());

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| WavedeckError::Resource(format!("failed to create audio sink: {e}")))?;
        sink.pause();
        sink.set_volume(volume);
        sink.append(tapped);

        debug!(path = %path.display(), duration, sample_rate, "resource created");
        Ok(Box::new(RodioResource {
            sink,
            tap,
            duration,
            events: VecDeque::from([ResourceEvent::Loaded(duration)]),
            started: false,
            ended: false,
            stopped: false,
        }))
    }
}
