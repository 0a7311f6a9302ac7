//! Wavedeck demo CLI.
//!
//! Plays local audio files through the streaming backend and renders the
//! spectrum bars as colored columns in the terminal. Built as a host-loop
//! reference for the library; all playback logic lives in the crate.

#[cfg(not(feature = "streaming"))]
fn main() {
    eprintln!("wavedeck was built without audio support.");
    eprintln!("Rebuild with: cargo run --features streaming -- <files...>");
    std::process::exit(1);
}

#[cfg(feature = "streaming")]
fn main() -> anyhow::Result<()> {
    streaming::run()
}

#[cfg(feature = "streaming")]
mod streaming {
    use std::env;
    use std::io::Write;
    use std::time::{Duration, Instant};

    use anyhow::Context;
    use tracing_subscriber::EnvFilter;

    use wavedeck::backend::{FftAnalyzer, RodioProvider};
    use wavedeck::playlist::{Repeat, Track, TrackSource};
    use wavedeck::{BarColor, Player, PlayerConfig, RenderSurface, BAR_COUNT};

    /// Terminal rows used for the bar display.
    const DISPLAY_ROWS: usize = 14;

    /// Host tick interval (~30 fps).
    const TICK_MILLIS: u64 = 33;

    /// Ticks without a live session before the loop exits.
    const IDLE_TICK_LIMIT: u32 = 15;

    /// Parsed command-line arguments.
    #[derive(Debug, Default)]
    struct CliArgs {
        /// Audio files to queue, in order.
        files: Vec<String>,
        /// Initial volume override.
        volume: Option<f32>,
        /// Start with shuffle enabled.
        shuffle: bool,
        /// Repeat policy override.
        repeat: Option<Repeat>,
        /// Optional JSON config path.
        config: Option<String>,
        /// Whether help was requested.
        show_help: bool,
    }

    impl CliArgs {
        fn parse() -> Self {
            let mut args = Self::default();
            let mut iter = env::args().skip(1);

            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--help" | "-h" => {
                        args.show_help = true;
                    }
                    "--shuffle" => {
                        args.shuffle = true;
                    }
                    "--volume" => match iter.next().and_then(|v| v.parse().ok()) {
                        Some(volume) => args.volume = Some(volume),
                        None => {
                            eprintln!("--volume requires a number in [0, 1]");
                            args.show_help = true;
                        }
                    },
                    "--repeat" => match iter.next().as_deref().map(parse_repeat) {
                        Some(Some(repeat)) => args.repeat = Some(repeat),
                        _ => {
                            eprintln!("--repeat requires one of: none, one, all");
                            args.show_help = true;
                        }
                    },
                    "--config" => match iter.next() {
                        Some(path) => args.config = Some(path),
                        None => {
                            eprintln!("--config requires a file path");
                            args.show_help = true;
                        }
                    },
                    _ if arg.starts_with('-') => {
                        eprintln!("Unknown flag: {arg}");
                        args.show_help = true;
                    }
                    _ => {
                        args.files.push(arg);
                    }
                }
            }

            args
        }

        fn print_help() {
            eprintln!(
                "Usage:\n  wavedeck [flags] <file> [file...]\n\n\
                 Flags:\n\
                 \x20 --volume <v>     Initial volume in [0, 1] (default 1.0)\n\
                 \x20 --shuffle        Start with shuffle enabled\n\
                 \x20 --repeat <mode>  Repeat policy: none (default), one, all\n\
                 \x20 --config <path>  Load defaults from a JSON config file\n\
                 \x20 -h, --help       Show this help\n"
            );
        }
    }

    fn parse_repeat(value: &str) -> Option<Repeat> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Some(Repeat::None),
            "one" => Some(Repeat::One),
            "all" => Some(Repeat::All),
            _ => None,
        }
    }

    /// Bar renderer drawing colored columns with ANSI truecolor.
    struct TermSurface {
        /// Per-bar height and color, in call order since the last clear.
        bars: Vec<(f32, BarColor)>,
        /// Whether a frame has been printed (controls cursor rewind).
        printed: bool,
    }

    impl TermSurface {
        fn new() -> Self {
            Self {
                bars: Vec::with_capacity(BAR_COUNT),
                printed: false,
            }
        }
    }

    impl RenderSurface for TermSurface {
        fn size(&self) -> (f32, f32) {
            // One logical column per bar plus the configured gaps.
            (
                BAR_COUNT as f32 + (BAR_COUNT as f32 - 1.0) * wavedeck::BAR_GAP,
                DISPLAY_ROWS as f32,
            )
        }

        fn clear(&mut self) {
            self.bars.clear();
        }

        fn fill_bar(&mut self, _x: f32, _width: f32, height: f32, color: BarColor) {
            self.bars.push((height, color));
        }

        fn present(&mut self) {
            let mut out = String::with_capacity(BAR_COUNT * DISPLAY_ROWS * 4);
            if self.printed {
                out.push_str(&format!("\r\x1b[{}A", DISPLAY_ROWS));
            }
            for row in 0..DISPLAY_ROWS {
                let threshold = (DISPLAY_ROWS - row) as f32 - 0.5;
                for &(height, color) in &self.bars {
                    if height >= threshold {
                        let (r, g, b) = color.to_rgb();
                        out.push_str(&format!("\x1b[38;2;{r};{g};{b}m\u{2588}\x1b[0m"));
                    } else {
                        out.push(' ');
                    }
                }
                out.push('\n');
            }
            print!("{out}");
            let _ = std::io::stdout().flush();
            self.printed = true;
        }
    }

    pub fn run() -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();

        let args = CliArgs::parse();
        if args.show_help || args.files.is_empty() {
            CliArgs::print_help();
            return if args.show_help {
                Ok(())
            } else {
                Err(anyhow::anyhow!("no input files"))
            };
        }

        let mut config = match args.config.as_deref() {
            Some(path) => {
                PlayerConfig::load(path).with_context(|| format!("loading config {path}"))?
            }
            None => PlayerConfig::default(),
        };
        if let Some(volume) = args.volume {
            config.volume = volume;
        }
        if args.shuffle {
            config.shuffle = true;
        }
        if let Some(repeat) = args.repeat {
            config.repeat = repeat;
        }

        println!("Wavedeck - playback and spectrum visualization");
        println!("==============================================\n");

        let provider = RodioProvider::new().context("opening audio output")?;
        let mut player = Player::with_config(
            Box::new(provider),
            Box::new(|| Box::new(FftAnalyzer::new())),
            config,
        );

        for (id, file) in args.files.iter().enumerate() {
            let title = std::path::Path::new(file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.clone());
            player.queue(Track::new(id as u64, title, "", TrackSource::path(file)));
        }
        println!("Queued {} track(s)\n", player.playlist().len());

        player.play_track_at(0);

        let started = Instant::now();
        let mut surface = TermSurface::new();
        let mut idle_ticks = 0u32;
        loop {
            let now = started.elapsed().as_secs_f64();
            player.tick(now, Some(&mut surface));

            if let Some(track) = player.playlist().current_track() {
                print!(
                    "\r\x1b[K{}  {:>6.1}s / {:.1}s",
                    track.display_string(),
                    player.position(),
                    player.duration()
                );
                let _ = std::io::stdout().flush();
            }

            if player.has_session() {
                idle_ticks = 0;
            } else {
                idle_ticks += 1;
                if idle_ticks > IDLE_TICK_LIMIT {
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(TICK_MILLIS));
        }

        player.teardown();
        println!(
            "\n\nPlayback complete ({:.1}s elapsed)",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
