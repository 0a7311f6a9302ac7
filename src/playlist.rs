//! Track data model and playlist state.
//!
//! A [`Track`] is immutable once created; the playlist holds an ordered
//! sequence of tracks whose order is the default playback sequence. All
//! playlist mutation goes through the defined operations here - UI layers
//! never manipulate indices directly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to a playable audio source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackSource {
    /// Local file path, decoded by the resource provider.
    File(PathBuf),
    /// Remote or otherwise opaque location, resolved by the provider.
    Url(String),
}

impl TrackSource {
    /// Build a file-backed source.
    pub fn path(path: impl AsRef<Path>) -> Self {
        TrackSource::File(path.as_ref().to_path_buf())
    }

    /// Display string for logs and the demo UI.
    pub fn display(&self) -> String {
        match self {
            TrackSource::File(p) => p.display().to_string(),
            TrackSource::Url(u) => u.clone(),
        }
    }
}

/// One entry in the playlist. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    /// Stable unique id.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Display artist.
    pub artist: String,
    /// Duration in seconds; 0.0 until known.
    pub duration: f64,
    /// Playable source reference.
    pub source: TrackSource,
    /// Optional container/codec hint for the provider.
    pub format: Option<String>,
    /// Optional cover-image reference.
    pub cover: Option<String>,
}

impl Track {
    /// Create a track with unknown duration and no optional metadata.
    pub fn new(id: u64, title: impl Into<String>, artist: impl Into<String>, source: TrackSource) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            duration: 0.0,
            source,
            format: None,
            cover: None,
        }
    }

    /// Display string for the demo UI ("artist - title").
    pub fn display_string(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// Repeat policy for the playback sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    /// Playback halts after the last track.
    #[default]
    None,
    /// The current track replays indefinitely.
    One,
    /// The sequence wraps around after the last track.
    All,
}

/// Ordered track sequence plus the selection/shuffle/repeat state that
/// the sequencer operates on.
#[derive(Default)]
pub struct PlaylistState {
    /// All tracks in playback order.
    tracks: Vec<Track>,
    /// Currently selected index; `None` when nothing is selected.
    current: Option<usize>,
    /// Whether shuffle is enabled.
    shuffle: bool,
    /// Derived permutation of indices excluding the current one.
    /// Regenerated on shuffle toggle, empty when shuffle is off.
    shuffle_order: Vec<usize>,
    /// Repeat policy.
    repeat: Repeat,
}

impl PlaylistState {
    /// Create an empty playlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the end of the sequence.
    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if the playlist is empty.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Currently selected index, if any.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Track at the current index, if any.
    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Track at an arbitrary index.
    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Select a track by index. Out-of-range indices clear the selection.
    pub fn set_current(&mut self, index: usize) {
        self.current = (index < self.tracks.len()).then_some(index);
    }

    /// Clear the selection.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Whether shuffle is enabled.
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Derived shuffle order (empty when shuffle is off).
    pub fn shuffle_order(&self) -> &[usize] {
        &self.shuffle_order
    }

    /// Current repeat policy.
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Set the repeat policy.
    pub fn set_repeat(&mut self, repeat: Repeat) {
        self.repeat = repeat;
    }

    /// Toggle shuffle, regenerating or clearing the derived order.
    ///
    /// Turning shuffle on draws a fresh uniformly random permutation of all
    /// indices excluding the current one; turning it off clears the order.
    pub fn toggle_shuffle(&mut self) {
        self.toggle_shuffle_with(&mut rand::thread_rng());
    }

    /// [`Self::toggle_shuffle`] with a caller-supplied RNG, for seeded tests.
    pub fn toggle_shuffle_with(&mut self, rng: &mut impl rand::Rng) {
        self.shuffle = !self.shuffle;
        if self.shuffle {
            self.shuffle_order = crate::sequencer::shuffle_order(self.tracks.len(), self.current, rng);
        } else {
            self.shuffle_order.clear();
        }
    }
}
