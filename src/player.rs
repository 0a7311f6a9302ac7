//! Player controller - wires engine, sequencer, tap and visualization.
//!
//! The controller owns the data flow of the core: the sequencer decides
//! which track plays, the engine loads and plays it, the signal tap binds to
//! the engine's live resource, and the visualization loop polls the tap
//! every refresh opportunity. Everything runs on one logical thread; the
//! host drives [`Player::tick`] and the transport methods.

use tracing::debug;

use crate::config::PlayerConfig;
use crate::engine::{EngineEvent, PlaybackEngine};
use crate::playlist::{PlaylistState, Repeat, Track};
use crate::poll::PositionPoller;
use crate::resource::{RenderSurface, ResourceProvider};
use crate::sequencer;
use crate::tap::{AnalysisFactory, SignalTap};
use crate::viz::VisualizationLoop;
use crate::FREQ_BINS;

/// Top-level playback controller.
pub struct Player {
    engine: PlaybackEngine,
    playlist: PlaylistState,
    tap: SignalTap,
    viz: VisualizationLoop,
    poller: PositionPoller,
    /// Last published playback position, in seconds.
    position: f64,
}

impl Player {
    /// Create a player with default configuration.
    pub fn new(provider: Box<dyn ResourceProvider>, analysis: AnalysisFactory) -> Self {
        Self::with_config(provider, analysis, PlayerConfig::default())
    }

    /// Create a player applying startup configuration.
    pub fn with_config(
        provider: Box<dyn ResourceProvider>,
        analysis: AnalysisFactory,
        config: PlayerConfig,
    ) -> Self {
        let mut engine = PlaybackEngine::new(provider);
        engine.set_volume(config.volume);
        let mut playlist = PlaylistState::new();
        playlist.set_repeat(config.repeat);
        if config.shuffle {
            playlist.toggle_shuffle();
        }
        Self {
            engine,
            playlist,
            tap: SignalTap::new(analysis),
            viz: VisualizationLoop::new(),
            poller: PositionPoller::new(),
            position: 0.0,
        }
    }

    /// Append a track to the playlist.
    pub fn queue(&mut self, track: Track) {
        self.playlist.push(track);
    }

    /// Read access to the playlist state.
    pub fn playlist(&self) -> &PlaylistState {
        &self.playlist
    }

    /// Whether audio is actually playing.
    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// Whether any session is live.
    pub fn has_session(&self) -> bool {
        self.engine.session_id().is_some()
    }

    /// Last published playback position, in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Duration of the loaded track, 0.0 while unknown.
    pub fn duration(&self) -> f64 {
        self.engine.duration()
    }

    /// Select and play the track at `index`. Out-of-range indices are
    /// ignored.
    pub fn play_track_at(&mut self, index: usize) {
        let Some(track) = self.playlist.track_at(index).cloned() else {
            return;
        };
        self.playlist.set_current(index);
        self.position = 0.0;
        self.engine.load_and_play(track);
    }

    /// Pause when playing, resume or start otherwise.
    pub fn toggle_play(&mut self) {
        if self.engine.is_playing() {
            self.engine.pause();
        } else if self.has_session() {
            self.engine.resume();
        } else if let Some(index) = self.playlist.current_index() {
            self.play_track_at(index);
        } else if !self.playlist.is_empty() {
            self.play_track_at(0);
        }
    }

    /// Advance to the next track per the shuffle/repeat policy; halts
    /// playback when the sequence is exhausted.
    pub fn next(&mut self) {
        match sequencer::next_index(
            self.playlist.current_index(),
            self.playlist.len(),
            self.playlist.shuffle(),
            self.playlist.shuffle_order(),
            self.playlist.repeat(),
        ) {
            Some(index) => self.play_track_at(index),
            None => self.stop(),
        }
    }

    /// Step to the previous track; always wraps at the beginning.
    pub fn previous(&mut self) {
        if let Some(index) = sequencer::previous_index(
            self.playlist.current_index(),
            self.playlist.len(),
            self.playlist.shuffle(),
            self.playlist.shuffle_order(),
        ) {
            self.play_track_at(index);
        }
    }

    /// Set the engine volume (clamped to [0, 1]).
    pub fn set_volume(&mut self, volume: f32) {
        self.engine.set_volume(volume);
    }

    /// Seek within the loaded track.
    pub fn seek(&mut self, seconds: f64) {
        self.engine.seek(seconds);
    }

    /// Toggle shuffle, regenerating the derived order.
    pub fn toggle_shuffle(&mut self) {
        self.playlist.toggle_shuffle();
    }

    /// Set the repeat policy.
    pub fn set_repeat(&mut self, repeat: Repeat) {
        self.playlist.set_repeat(repeat);
    }

    /// Stop playback and unwind the binding and loops.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.tap.release();
        self.viz.set_playing(false);
        self.poller.stop();
        self.position = 0.0;
    }

    /// Unwind everything, including the shared analysis context. Safe to
    /// call more than once and in any teardown order relative to drops.
    pub fn teardown(&mut self) {
        self.stop();
        self.tap.teardown();
    }

    /// Drive one host tick at time `now` (seconds): pump engine events,
    /// publish the position at the gated rate, and execute the scheduled
    /// visualization step against `surface`.
    pub fn tick(&mut self, now: f64, surface: Option<&mut dyn RenderSurface>) {
        self.engine.pump();
        while let Some(event) = self.engine.take_event() {
            self.handle_event(event);
        }

        if self.poller.should_publish(now) {
            self.position = self.engine.current_time_poll();
        }

        // Every read from the tap is guarded by session identity; a stale
        // or missing binding yields no data and the loop falls back.
        let mut bins = [0u8; FREQ_BINS];
        let have_bins = match self.engine.session_id() {
            Some(session) => self.tap.read_frame(session, &mut bins),
            None => false,
        };
        self.viz.step(now, have_bins.then_some(&bins), surface);
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Loaded { duration } => {
                debug!(duration, "track loaded");
            }
            EngineEvent::Started => {
                // Opportunistic attach retry on every transition to playing;
                // earlier failures are never terminal.
                if let (Some(session), Some(point)) =
                    (self.engine.session_id(), self.engine.tap_point())
                {
                    let _ = self.tap.attach(session, &point);
                }
                self.viz.set_playing(true);
                self.poller.start();
            }
            EngineEvent::Paused => {
                self.viz.set_playing(false);
                self.poller.stop();
            }
            EngineEvent::Ended => {
                self.viz.set_playing(false);
                self.poller.stop();
                self.tap.release();
                self.position = 0.0;
                self.advance_after_end();
            }
            EngineEvent::Stopped => {
                self.viz.set_playing(false);
                self.poller.stop();
                self.tap.release();
                self.position = 0.0;
            }
        }
    }

    /// `ended` policy: repeat-one replays the same track directly (the
    /// sequencer is bypassed); otherwise the sequencer picks the successor
    /// or playback halts with no session.
    fn advance_after_end(&mut self) {
        if self.playlist.repeat() == Repeat::One {
            self.engine.replay_current();
            return;
        }
        match sequencer::next_index(
            self.playlist.current_index(),
            self.playlist.len(),
            self.playlist.shuffle(),
            self.playlist.shuffle_order(),
            self.playlist.repeat(),
        ) {
            Some(index) => self.play_track_at(index),
            None => {
                debug!("sequence exhausted, halting");
                self.playlist.clear_current();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::TrackSource;
    use crate::resource::{
        AnalysisSource, AttachFailure, AudioResource, ResourceEvent, ResourceProvider, TapPoint,
    };
    use crate::Result;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Event queue handle shared with the test so `Ended` can be injected.
    type EventQueue = Arc<Mutex<VecDeque<ResourceEvent>>>;

    struct ScriptedResource {
        events: EventQueue,
        duration: f64,
        position: f64,
        tap: TapPoint,
    }

    impl AudioResource for ScriptedResource {
        fn play(&mut self) {
            self.events.lock().push_back(ResourceEvent::Started);
        }
        fn pause(&mut self) {
            self.events.lock().push_back(ResourceEvent::Paused);
        }
        fn stop(&mut self) {}
        fn seek(&mut self, seconds: f64) {
            self.position = seconds;
        }
        fn set_volume(&mut self, _volume: f32) {}
        fn duration(&self) -> f64 {
            self.duration
        }
        fn position(&self) -> f64 {
            self.position
        }
        fn take_event(&mut self) -> Option<ResourceEvent> {
            self.events.lock().pop_front()
        }
        fn tap_point(&self) -> Option<TapPoint> {
            Some(self.tap.clone())
        }
    }

    #[derive(Default)]
    struct ScriptedProvider {
        /// Durations per source path stem, falling back to 10s.
        durations: Vec<(String, f64)>,
        queues: Arc<Mutex<Vec<EventQueue>>>,
    }

    impl ResourceProvider for ScriptedProvider {
        fn create(&mut self, source: &TrackSource, _volume: f32) -> Result<Box<dyn AudioResource>> {
            let name = source.display();
            let duration = self
                .durations
                .iter()
                .find(|(stem, _)| name.contains(stem.as_str()))
                .map(|&(_, d)| d)
                .unwrap_or(10.0);

            let events: EventQueue = Arc::new(Mutex::new(VecDeque::from([
                ResourceEvent::Loaded(duration),
            ])));
            self.queues.lock().push(Arc::clone(&events));

            let tap = TapPoint::new(1024, 44_100);
            tap.buffer.lock().push(&[0.1; 8]);
            Ok(Box::new(ScriptedResource {
                events,
                duration,
                position: 0.0,
                tap,
            }))
        }
    }

    struct ReadySource;
    impl AnalysisSource for ReadySource {
        fn try_attach(&mut self, point: &TapPoint) -> std::result::Result<(), AttachFailure> {
            if point.is_ready() {
                Ok(())
            } else {
                Err(AttachFailure::NotReady)
            }
        }
        fn read_magnitudes(&mut self, out: &mut [u8]) -> bool {
            out.fill(128);
            true
        }
        fn disconnect(&mut self) {}
        fn close(&mut self) {}
    }

    fn two_track_player() -> (Player, Arc<Mutex<Vec<EventQueue>>>) {
        let provider = ScriptedProvider {
            durations: vec![("a.ogg".into(), 10.0), ("b.ogg".into(), 20.0)],
            ..Default::default()
        };
        let queues = Arc::clone(&provider.queues);
        let mut player = Player::new(Box::new(provider), Box::new(|| Box::new(ReadySource)));
        player.queue(Track::new(0, "A", "", TrackSource::path("a.ogg")));
        player.queue(Track::new(1, "B", "", TrackSource::path("b.ogg")));
        (player, queues)
    }

    fn inject_ended(queues: &Arc<Mutex<Vec<EventQueue>>>) {
        queues
            .lock()
            .last()
            .unwrap()
            .lock()
            .push_back(ResourceEvent::Ended);
    }

    #[test]
    fn plays_through_playlist_then_halts() {
        let (mut player, queues) = two_track_player();

        player.play_track_at(0);
        player.tick(0.0, None);
        assert!(player.is_playing());
        assert_eq!(player.duration(), 10.0);

        inject_ended(&queues);
        player.tick(0.1, None);
        // A ended; engine auto-plays B.
        assert_eq!(player.playlist().current_index(), Some(1));
        player.tick(0.2, None);
        assert!(player.is_playing());
        assert_eq!(player.duration(), 20.0);

        inject_ended(&queues);
        player.tick(0.3, None);
        player.tick(0.4, None);
        assert!(!player.is_playing());
        assert!(!player.has_session());
        assert_eq!(player.playlist().current_index(), None);
    }

    #[test]
    fn repeat_one_replays_same_track() {
        let (mut player, queues) = two_track_player();
        player.set_repeat(Repeat::One);

        player.play_track_at(0);
        player.tick(0.0, None);

        inject_ended(&queues);
        player.tick(0.1, None);
        player.tick(0.2, None);

        assert!(player.is_playing());
        assert_eq!(player.playlist().current_index(), Some(0));
        assert_eq!(player.playlist().current_track().unwrap().id, 0);
        assert_eq!(player.position(), 0.0);
        assert_eq!(player.duration(), 10.0);
    }

    #[test]
    fn started_event_starts_loops_and_pause_stops_them() {
        let (mut player, _queues) = two_track_player();
        player.play_track_at(0);
        player.tick(0.0, None);

        assert!(player.viz.is_running());
        assert!(player.poller.is_active());

        player.toggle_play();
        player.tick(0.1, None);
        assert!(!player.is_playing());
        assert!(!player.viz.is_running());
        assert!(!player.poller.is_active());
    }

    #[test]
    fn tap_attaches_on_start_and_feeds_real_frames() {
        let (mut player, _queues) = two_track_player();
        player.play_track_at(0);
        player.tick(0.0, None);
        player.tick(0.05, None);

        let frame = player.viz.last_frame().expect("a step must have run");
        assert!(!frame.synthetic, "attached tap should yield real data");
    }

    #[test]
    fn manual_next_at_end_without_repeat_stops() {
        let (mut player, _queues) = two_track_player();
        player.play_track_at(1);
        player.tick(0.0, None);

        player.next();
        player.tick(0.1, None);
        assert!(!player.has_session());
        assert_eq!(player.position(), 0.0);
    }

    #[test]
    fn previous_always_wraps_to_last() {
        let (mut player, _queues) = two_track_player();
        player.play_track_at(0);
        player.tick(0.0, None);

        player.previous();
        assert_eq!(player.playlist().current_index(), Some(1));
    }

    #[test]
    fn position_updates_at_gated_rate() {
        let (mut player, _queues) = two_track_player();
        player.play_track_at(0);
        player.tick(0.0, None);

        player.seek(5.0);
        // Gate not yet open: position unchanged.
        player.tick(0.1, None);
        assert_eq!(player.position(), 0.0);
        // Past the 250 ms gate: republished from the resource.
        player.tick(0.3, None);
        assert_eq!(player.position(), 5.0);
    }

    #[test]
    fn teardown_twice_is_safe() {
        let (mut player, _queues) = two_track_player();
        player.play_track_at(0);
        player.tick(0.0, None);

        player.teardown();
        player.teardown();
        assert!(!player.has_session());
    }

    #[test]
    fn unsupported_track_leaves_functioning_empty_state() {
        struct FailingProvider;
        impl ResourceProvider for FailingProvider {
            fn create(&mut self, _: &TrackSource, _: f32) -> Result<Box<dyn AudioResource>> {
                Err("bad codec".into())
            }
        }
        let mut player = Player::new(Box::new(FailingProvider), Box::new(|| Box::new(ReadySource)));
        player.queue(Track::new(0, "A", "", TrackSource::path("a.xyz")));

        player.play_track_at(0);
        player.tick(0.0, None);
        assert!(!player.is_playing());
        assert!(!player.has_session());
        assert_eq!(player.duration(), 0.0);
    }
}
