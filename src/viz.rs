//! Visualization Loop - continuously re-scheduled bar rendering.
//!
//! The loop runs only while audio is playing, one step per refresh
//! opportunity, with a single-flight guard: entering the running state arms
//! exactly one pending step, each executed step re-arms itself while the
//! policy still says "running", and cancellation is synchronous and
//! idempotent. Each step paints the background, obtains a frame (real
//! analyser data when a valid binding exists, synthetic fallback otherwise)
//! and renders the bars.

use crate::resource::RenderSurface;
use crate::{BAR_COUNT, BAR_GAP, FALLBACK_HEIGHT_SCALE, FREQ_BINS, REAL_HEIGHT_SCALE};

/// Start of the linear hue sweep across the bars, in degrees.
const HUE_START: f32 = 180.0;

/// Span of the hue sweep from first to last bar, in degrees.
const HUE_SPAN: f32 = 150.0;

/// One array of normalized bin magnitudes, plus whether it was synthesized.
/// Ephemeral - rebuilt every step, never persisted.
#[derive(Clone, Debug)]
pub struct VisualizationFrame {
    /// Normalized magnitudes in [0, 1], one per bar.
    pub bars: [f32; BAR_COUNT],
    /// True when the frame came from the fallback animation.
    pub synthetic: bool,
}

impl VisualizationFrame {
    /// Downsample raw analyser byte magnitudes into bar magnitudes.
    ///
    /// Each bar averages its proportional share of the frequency bins.
    pub fn from_bins(bins: &[u8; FREQ_BINS]) -> Self {
        let mut bars = [0.0f32; BAR_COUNT];
        for (i, bar) in bars.iter_mut().enumerate() {
            let start = i * FREQ_BINS / BAR_COUNT;
            let end = ((i + 1) * FREQ_BINS / BAR_COUNT).max(start + 1);
            let sum: u32 = bins[start..end].iter().map(|&b| b as u32).sum();
            *bar = sum as f32 / ((end - start) as f32 * 255.0);
        }
        Self {
            bars,
            synthetic: false,
        }
    }

    /// Fallback animation: a smooth pseudo-periodic function of elapsed
    /// time per bar, so the display never looks dead without real data.
    pub fn synthetic(elapsed: f64) -> Self {
        let t = elapsed as f32;
        let mut bars = [0.0f32; BAR_COUNT];
        for (i, bar) in bars.iter_mut().enumerate() {
            let phase = i as f32;
            let wave = (t * 2.4 + phase * 0.13).sin() * (t * 0.9 + phase * 0.047).sin();
            *bar = (0.5 + 0.5 * wave).clamp(0.0, 1.0);
        }
        Self {
            bars,
            synthetic: true,
        }
    }
}

/// Bar fill color in HSL space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarColor {
    /// Hue in degrees [0, 360).
    pub hue: f32,
    /// Saturation percentage [0, 100].
    pub saturation: f32,
    /// Lightness percentage [0, 100].
    pub lightness: f32,
}

impl BarColor {
    /// Deterministic color for a bar: linear hue sweep over the bar index,
    /// saturation and lightness rising with magnitude.
    pub fn for_bar(index: usize, magnitude: f32) -> Self {
        let position = index as f32 / (BAR_COUNT - 1) as f32;
        let magnitude = magnitude.clamp(0.0, 1.0);
        Self {
            hue: HUE_START + position * HUE_SPAN,
            saturation: 55.0 + magnitude * 45.0,
            lightness: 30.0 + magnitude * 30.0,
        }
    }

    /// Convert to 8-bit RGB for surfaces that draw in RGB space.
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let h = self.hue.rem_euclid(360.0) / 60.0;
        let s = (self.saturation / 100.0).clamp(0.0, 1.0);
        let l = (self.lightness / 100.0).clamp(0.0, 1.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        (
            ((r + m) * 255.0).round() as u8,
            ((g + m) * 255.0).round() as u8,
            ((b + m) * 255.0).round() as u8,
        )
    }
}

/// Loop scheduling state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum LoopState {
    /// No stepping; nothing pending.
    #[default]
    Idle,
    /// Steps re-arm themselves each refresh opportunity.
    Running,
}

/// The continuously re-scheduled rendering step.
///
/// The host calls [`VisualizationLoop::step`] once per refresh opportunity;
/// whether the step actually executes is governed by the playing policy and
/// the single-flight pending flag.
#[derive(Default)]
pub struct VisualizationLoop {
    state: LoopState,
    /// Single-flight guard: true when exactly one step is scheduled.
    pending: bool,
    last_frame: Option<VisualizationFrame>,
}

impl VisualizationLoop {
    /// Create an idle loop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the loop is in the running state.
    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Whether a step is currently scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.pending
    }

    /// The frame produced by the most recent executed step.
    pub fn last_frame(&self) -> Option<&VisualizationFrame> {
        self.last_frame.as_ref()
    }

    /// Drive the running policy from the playing flag.
    ///
    /// Entering running arms exactly one pending step; a repeat call while
    /// already running schedules nothing further. Leaving running cancels
    /// the pending step synchronously; cancelling twice is a no-op.
    pub fn set_playing(&mut self, playing: bool) {
        if playing {
            if self.state == LoopState::Idle {
                self.state = LoopState::Running;
                self.pending = true;
            }
        } else {
            self.state = LoopState::Idle;
            self.pending = false;
        }
    }

    /// Execute the scheduled step, if one is pending.
    ///
    /// `bins` carries real analyser data when a valid binding produced it
    /// this tick; `elapsed` is host time in seconds for the fallback
    /// animation; a missing `surface` skips painting silently. Returns true
    /// when a further step was scheduled.
    pub fn step(
        &mut self,
        elapsed: f64,
        bins: Option<&[u8; FREQ_BINS]>,
        surface: Option<&mut dyn RenderSurface>,
    ) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;

        let frame = match bins {
            Some(bins) => VisualizationFrame::from_bins(bins),
            None => VisualizationFrame::synthetic(elapsed),
        };

        if let Some(surface) = surface {
            render_bars(surface, &frame);
        }
        self.last_frame = Some(frame);

        if self.state == LoopState::Running {
            self.pending = true;
        }
        self.pending
    }
}

/// Paint one frame of bars onto the surface.
fn render_bars(surface: &mut dyn RenderSurface, frame: &VisualizationFrame) {
    let (width, height) = surface.size();
    let scale = if frame.synthetic {
        FALLBACK_HEIGHT_SCALE
    } else {
        REAL_HEIGHT_SCALE
    };
    let bar_width = (width - (BAR_COUNT as f32 - 1.0) * BAR_GAP) / BAR_COUNT as f32;

    surface.clear();
    for (i, &magnitude) in frame.bars.iter().enumerate() {
        let x = i as f32 * (bar_width + BAR_GAP);
        let bar_height = magnitude * scale * height;
        surface.fill_bar(x, bar_width.max(1.0), bar_height, BarColor::for_bar(i, magnitude));
    }
    surface.present();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct RecordingSurface {
        clears: usize,
        bars: Vec<(f32, f32, f32, BarColor)>,
        presents: usize,
    }

    impl RenderSurface for RecordingSurface {
        fn size(&self) -> (f32, f32) {
            (960.0, 200.0)
        }
        fn clear(&mut self) {
            self.clears += 1;
            self.bars.clear();
        }
        fn fill_bar(&mut self, x: f32, width: f32, height: f32, color: BarColor) {
            self.bars.push((x, width, height, color));
        }
        fn present(&mut self) {
            self.presents += 1;
        }
    }

    #[test]
    fn idle_loop_never_steps() {
        let mut viz = VisualizationLoop::new();
        let mut surface = RecordingSurface::default();
        assert!(!viz.step(0.0, None, Some(&mut surface)));
        assert_eq!(surface.clears, 0);
        assert!(viz.last_frame().is_none());
    }

    #[test]
    fn entering_running_arms_exactly_one_step() {
        let mut viz = VisualizationLoop::new();
        viz.set_playing(true);
        assert!(viz.is_scheduled());
        // Re-entering while running must not double-schedule.
        viz.set_playing(true);

        let mut surface = RecordingSurface::default();
        assert!(viz.step(0.0, None, Some(&mut surface)));
        assert_eq!(surface.clears, 1);
        assert_eq!(surface.bars.len(), BAR_COUNT);
        assert_eq!(surface.presents, 1);
    }

    #[test]
    fn cancel_stops_further_paints_and_is_idempotent() {
        let mut viz = VisualizationLoop::new();
        viz.set_playing(true);
        let mut surface = RecordingSurface::default();
        viz.step(0.0, None, Some(&mut surface));

        viz.set_playing(false);
        viz.set_playing(false);
        assert!(!viz.is_scheduled());
        assert!(!viz.step(0.1, None, Some(&mut surface)));
        assert_eq!(surface.clears, 1);
    }

    #[test]
    fn real_data_switches_off_the_fallback() {
        let mut viz = VisualizationLoop::new();
        viz.set_playing(true);

        let mut surface = RecordingSurface::default();
        viz.step(0.0, None, Some(&mut surface));
        assert!(viz.last_frame().unwrap().synthetic);

        let bins = [255u8; FREQ_BINS];
        viz.step(0.016, Some(&bins), Some(&mut surface));
        let frame = viz.last_frame().unwrap();
        assert!(!frame.synthetic);
        assert_relative_eq!(frame.bars[0], 1.0);

        // Binding lost again mid-playback: back to synthetic.
        viz.step(0.033, None, Some(&mut surface));
        assert!(viz.last_frame().unwrap().synthetic);
    }

    #[test]
    fn real_and_fallback_heights_use_their_scales() {
        let mut viz = VisualizationLoop::new();
        let mut surface = RecordingSurface::default();
        let (_, height) = surface.size();

        viz.set_playing(true);
        let bins = [255u8; FREQ_BINS];
        viz.step(0.0, Some(&bins), Some(&mut surface));
        let (_, _, bar_height, _) = surface.bars[0];
        assert_relative_eq!(bar_height, REAL_HEIGHT_SCALE * height);

        viz.step(0.016, None, Some(&mut surface));
        let tallest = surface
            .bars
            .iter()
            .map(|&(_, _, h, _)| h)
            .fold(0.0f32, f32::max);
        assert!(tallest <= FALLBACK_HEIGHT_SCALE * height + f32::EPSILON);
    }

    #[test]
    fn missing_surface_skips_the_paint_but_keeps_running() {
        let mut viz = VisualizationLoop::new();
        viz.set_playing(true);
        assert!(viz.step(0.0, None, None));
        assert!(viz.last_frame().is_some());
        assert!(viz.is_scheduled());
    }

    #[test]
    fn bar_colors_sweep_hue_and_scale_with_magnitude() {
        let low = BarColor::for_bar(0, 0.0);
        let high = BarColor::for_bar(BAR_COUNT - 1, 1.0);
        assert_relative_eq!(low.hue, HUE_START);
        assert_relative_eq!(high.hue, HUE_START + HUE_SPAN);
        assert!(high.saturation > low.saturation);
        assert!(high.lightness > low.lightness);
        // Deterministic: same inputs, same color.
        assert_eq!(BarColor::for_bar(10, 0.5), BarColor::for_bar(10, 0.5));
    }

    #[test]
    fn downsampling_averages_bin_groups() {
        let mut bins = [0u8; FREQ_BINS];
        for b in bins.iter_mut().take(FREQ_BINS / 2) {
            *b = 255;
        }
        let frame = VisualizationFrame::from_bins(&bins);
        assert_relative_eq!(frame.bars[0], 1.0);
        assert_relative_eq!(frame.bars[BAR_COUNT - 1], 0.0);
    }

    #[test]
    fn synthetic_frame_stays_normalized() {
        for step in 0..50 {
            let frame = VisualizationFrame::synthetic(step as f64 * 0.37);
            assert!(frame.bars.iter().all(|&m| (0.0..=1.0).contains(&m)));
        }
    }
}
