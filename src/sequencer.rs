//! Pure next/previous track selection under shuffle and repeat policies.
//!
//! These functions are decision logic only: they never touch the playback
//! engine and hold no state beyond the snapshot they are given, so every
//! policy is testable in isolation.
//!
//! One deliberate asymmetry: advancing past the end of the sequence ends
//! playback (unless repeat-all wraps), but stepping before the beginning
//! always wraps to the last element - "previous" never ends the playlist.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::playlist::Repeat;

/// Pick the index that plays after `current`.
///
/// Returns `None` when the sequence is exhausted (empty playlist, or past
/// the end without `Repeat::All`). With shuffle enabled the walk follows
/// `shuffle_order`; an index absent from the order (the one that was current
/// when the order was drawn) continues from the order's first entry.
pub fn next_index(
    current: Option<usize>,
    length: usize,
    shuffled: bool,
    shuffle_order: &[usize],
    repeat: Repeat,
) -> Option<usize> {
    if length == 0 {
        return None;
    }

    if shuffled && !shuffle_order.is_empty() {
        let pos = current.and_then(|c| shuffle_order.iter().position(|&i| i == c));
        return match pos {
            Some(p) if p + 1 < shuffle_order.len() => Some(shuffle_order[p + 1]),
            Some(_) => (repeat == Repeat::All).then(|| shuffle_order[0]),
            None => Some(shuffle_order[0]),
        };
    }

    match current {
        Some(c) if c + 1 < length => Some(c + 1),
        Some(_) => (repeat == Repeat::All).then_some(0),
        None => Some(0),
    }
}

/// Pick the index that plays before `current`.
///
/// Mirrors [`next_index`] but always wraps to the last element when moving
/// before index 0, independent of the repeat policy.
pub fn previous_index(
    current: Option<usize>,
    length: usize,
    shuffled: bool,
    shuffle_order: &[usize],
) -> Option<usize> {
    if length == 0 {
        return None;
    }

    if shuffled && !shuffle_order.is_empty() {
        let pos = current.and_then(|c| shuffle_order.iter().position(|&i| i == c));
        return match pos {
            Some(0) | None => shuffle_order.last().copied(),
            Some(p) => Some(shuffle_order[p - 1]),
        };
    }

    match current {
        Some(0) | None => Some(length - 1),
        Some(c) => Some(c - 1),
    }
}

/// Draw a uniformly random permutation of `0..length` excluding `current`.
///
/// Fisher-Yates over the remaining index set. Returns an empty order for
/// playlists of length 0 or 1 with the single index selected.
pub fn shuffle_order(length: usize, current: Option<usize>, rng: &mut impl Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..length).filter(|&i| Some(i) != current).collect();
    order.shuffle(rng);
    order
}
