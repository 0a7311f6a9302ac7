//! Playback Engine - owns the single live playback session.
//!
//! The engine holds at most one [`PlaybackSession`] (one track bound to one
//! live audio resource). Transport operations delegate to the resource;
//! observable state transitions are driven exclusively by the resource's own
//! lifecycle events, pumped once per tick, so the playing flag never lies
//! about real audio state.

use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::playlist::Track;
use crate::resource::{AudioResource, ResourceEvent, ResourceProvider, TapPoint};

/// Identity of one playback session, unique over the engine's lifetime.
///
/// Analysis bindings carry this id; a binding whose id no longer matches the
/// engine's current session reads as "no binding".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

#[cfg(test)]
impl SessionId {
    pub(crate) fn for_tests(value: u64) -> Self {
        SessionId(value)
    }
}

/// One live binding between a track and a decodable audio resource.
struct PlaybackSession {
    id: SessionId,
    resource: Box<dyn AudioResource>,
}

/// Lifecycle events the engine republishes to its controller.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Resource ready (or terminally failed, with duration 0.0).
    Loaded {
        /// Duration in seconds, 0.0 when unknown or unsupported.
        duration: f64,
    },
    /// Audio is audible.
    Started,
    /// Audio paused.
    Paused,
    /// Track finished naturally; the session has been released.
    Ended,
    /// Playback stopped explicitly; the session has been released.
    Stopped,
}

/// Transport engine owning the process-wide single live session.
pub struct PlaybackEngine {
    provider: Box<dyn ResourceProvider>,
    session: Option<PlaybackSession>,
    /// Track of the current or most recently ended session, kept for
    /// repeat-one replay.
    current_track: Option<Track>,
    next_session: u64,
    volume: f32,
    is_playing: bool,
    loading: bool,
    duration: f64,
    events: VecDeque<EngineEvent>,
}

impl PlaybackEngine {
    /// Create an engine with full volume and no session.
    pub fn new(provider: Box<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            session: None,
            current_track: None,
            next_session: 0,
            volume: 1.0,
            is_playing: false,
            loading: false,
            duration: 0.0,
            events: VecDeque::new(),
        }
    }

    /// Whether audio is actually playing (per the resource's own events).
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Duration of the loaded track, 0.0 while unknown.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Persistent engine volume in [0, 1].
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Id of the live session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Tap capability of the live session's resource, if any.
    pub fn tap_point(&self) -> Option<TapPoint> {
        self.session.as_ref().and_then(|s| s.resource.tap_point())
    }

    /// Track bound to the current (or just-ended) session.
    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    /// Release any live session, then create and start a new one for `track`.
    ///
    /// The release-before-create ordering is mandatory: no two resources are
    /// ever live at once. Returns immediately; audible start is signaled by
    /// [`EngineEvent::Started`] once the resource reports it.
    ///
    /// A provider failure is non-fatal: it surfaces as a terminal
    /// `Loaded { duration: 0.0 }` with no session.
    pub fn load_and_play(&mut self, track: Track) {
        self.release_session();
        self.duration = 0.0;
        self.is_playing = false;

        debug!(track = %track.display_string(), "loading track");
        self.loading = true;
        match self.provider.create(&track.source, self.volume) {
            Ok(mut resource) => {
                resource.set_volume(self.volume);
                resource.play();
                let id = SessionId(self.next_session);
                self.next_session += 1;
                self.session = Some(PlaybackSession { id, resource });
                self.current_track = Some(track);
            }
            Err(err) => {
                warn!(%err, "unsupported source, surfacing empty load");
                self.loading = false;
                self.current_track = Some(track);
                self.events.push_back(EngineEvent::Loaded { duration: 0.0 });
            }
        }
    }

    /// Replay the current track from the start (repeat-one path).
    /// No-op when no track has been loaded yet.
    pub fn replay_current(&mut self) {
        if let Some(track) = self.current_track.clone() {
            self.load_and_play(track);
        }
    }

    /// Pause the live resource. No-op without a session; the playing flag
    /// flips only when the resource confirms.
    pub fn pause(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.resource.pause();
        }
    }

    /// Resume the live resource. No-op without a session.
    pub fn resume(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.resource.play();
        }
    }

    /// Set the engine volume, clamped to [0, 1]. Applies to the live
    /// resource immediately and persists for future sessions.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(session) = self.session.as_mut() {
            session.resource.set_volume(self.volume);
        }
    }

    /// Seek the live resource, clamped to [0, duration]. The authoritative
    /// displayed time still comes from the position poller.
    pub fn seek(&mut self, seconds: f64) {
        if let Some(session) = self.session.as_mut() {
            let clamped = seconds.clamp(0.0, self.duration.max(0.0));
            session.resource.seek(clamped);
        }
    }

    /// Current resource position in seconds, 0.0 without a session.
    /// Cheap; intended for the ~4 Hz poller.
    pub fn current_time_poll(&self) -> f64 {
        self.session
            .as_ref()
            .map(|s| s.resource.position())
            .unwrap_or(0.0)
    }

    /// Stop playback and release the session. Idempotent.
    pub fn stop(&mut self) {
        if self.session.is_some() {
            self.release_session();
            self.current_track = None;
            self.loading = false;
            self.is_playing = false;
            self.events.push_back(EngineEvent::Stopped);
        }
    }

    /// Drain the resource's queued lifecycle events into engine state and
    /// republished [`EngineEvent`]s. Call once per tick.
    pub fn pump(&mut self) {
        loop {
            let Some(event) = self
                .session
                .as_mut()
                .and_then(|s| s.resource.take_event())
            else {
                return;
            };
            match event {
                ResourceEvent::Loaded(duration) => {
                    self.duration = duration;
                    self.loading = false;
                    self.events.push_back(EngineEvent::Loaded { duration });
                }
                ResourceEvent::Started => {
                    self.is_playing = true;
                    self.events.push_back(EngineEvent::Started);
                }
                ResourceEvent::Paused => {
                    self.is_playing = false;
                    self.events.push_back(EngineEvent::Paused);
                }
                ResourceEvent::Ended => {
                    debug!("track ended");
                    self.is_playing = false;
                    self.loading = false;
                    self.release_session();
                    self.events.push_back(EngineEvent::Ended);
                    return;
                }
                ResourceEvent::Failed(reason) => {
                    warn!(%reason, "resource failed, releasing session");
                    self.is_playing = false;
                    self.loading = false;
                    self.release_session();
                    self.events.push_back(EngineEvent::Stopped);
                    return;
                }
            }
        }
    }

    /// Drain the next republished lifecycle event, if any.
    pub fn take_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /// Stop and free the underlying resource. Tolerates there being none.
    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.resource.stop();
        }
    }
}
