//! Waterfall CLI: inspect MIDI files and dry-run their playback.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use waterfall_core::midi::{load_file_with_options, DecodeOptions, TempoMode};
use waterfall_core::playback::{Intensity, KeyboardState, NoteSignal, Scheduler, SchedulerConfig};
use waterfall_core::{NoteKind, Sequence};

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "waterfall",
    about = "Decode Standard MIDI Files and simulate falling-note playback",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tracks and notes of a MIDI file
    Inspect(InspectArgs),
    /// Run the playback scheduler headless and print the fired key signals
    Simulate(SimulateArgs),
}

// ─── Shared arguments ────────────────────────────────────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// MIDI file to load
    midi: PathBuf,

    /// Convert time with a single latest tempo instead of the full tempo map
    #[arg(long, default_value_t = false)]
    latest_tempo: bool,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl SharedArgs {
    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            tempo_mode: if self.latest_tempo {
                TempoMode::LatestOnly
            } else {
                TempoMode::Integrated
            },
        }
    }

    fn load(&self) -> Result<Sequence> {
        if !self.midi.exists() {
            bail!("File not found: {}", self.midi.display());
        }
        load_file_with_options(&self.midi, &self.decode_options())
            .with_context(|| format!("Failed to load {}", self.midi.display()))
    }
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Print the decoded sequence as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also list every note record
    #[arg(long, default_value_t = false)]
    notes: bool,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Playback speed multiplier (clamped to 0.1-3.0)
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Simulated frame length in milliseconds
    #[arg(long, default_value_t = 16.0)]
    frame_ms: f64,

    /// How long released notes stay on screen (ms)
    #[arg(long)]
    retention: Option<f64>,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::Inspect(a) if a.shared.verbose => "debug",
        Command::Simulate(a) if a.shared.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Inspect(args) => run_inspect(args),
        Command::Simulate(args) => run_simulate(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name, e.g. 60 -> "C4".
fn note_name(note: u8) -> String {
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

fn format_ms(ms: f64) -> String {
    let total_s = ms / 1000.0;
    let minutes = (total_s / 60.0).floor();
    format!("{:02}:{:06.3}", minutes as u32, total_s - minutes * 60.0)
}

// ─── Inspect ─────────────────────────────────────────────────────

fn run_inspect(args: InspectArgs) -> Result<()> {
    let sequence = args.shared.load()?;

    if args.json {
        let json = serde_json::to_string_pretty(&sequence)
            .context("Failed to serialize sequence")?;
        println!("{}", json);
        return Ok(());
    }

    let header = sequence.header();
    println!("File:       {}", args.shared.midi.display());
    println!("Format:     {}", header.format);
    println!("Division:   {:?}", header.division);
    println!("Tempo map:  {} change(s)", sequence.tempo_map().changes().len());
    for change in sequence.tempo_map().changes() {
        println!(
            "  tick {:>8}  {:>8} us/qn  ({:.1} BPM)",
            change.tick,
            change.micros_per_quarter,
            60_000_000.0 / f64::from(change.micros_per_quarter.max(1))
        );
    }
    println!("Duration:   {}", format_ms(f64::from(sequence.total_duration_ms())));
    println!("Tracks:     {}", sequence.tracks().len());
    for (i, track) in sequence.tracks().iter().enumerate() {
        let name = if track.name.is_empty() { "(unnamed)" } else { track.name.as_str() };
        println!(
            "  [{}] {:<24} {:>6} notes, ends {}",
            i,
            name,
            track.note_on_count(),
            format_ms(f64::from(track.end_ms()))
        );
    }

    if args.notes {
        for note in sequence.notes() {
            match note.kind {
                NoteKind::On => println!(
                    "{}  on   {:<4} ({:>3}) vel {:>3} {:?}  dur {:>6} ms  track {}",
                    format_ms(f64::from(note.time_ms)),
                    note_name(note.note),
                    note.note,
                    note.velocity,
                    Intensity::from_velocity(note.velocity),
                    note.duration_ms,
                    note.track
                ),
                NoteKind::Off => println!(
                    "{}  off  {:<4} ({:>3})  track {}",
                    format_ms(f64::from(note.time_ms)),
                    note_name(note.note),
                    note.note,
                    note.track
                ),
            }
        }
    }

    Ok(())
}

// ─── Simulate ────────────────────────────────────────────────────

fn run_simulate(args: SimulateArgs) -> Result<()> {
    if !args.frame_ms.is_finite() || args.frame_ms <= 0.0 {
        bail!("--frame-ms must be positive, got {}", args.frame_ms);
    }
    let sequence = Arc::new(args.shared.load()?);

    let mut config = SchedulerConfig::default();
    if let Some(retention) = args.retention {
        config.retention_ms = retention.max(0.0);
    }
    let mut scheduler = Scheduler::new(config);
    scheduler.set_speed(args.speed);
    scheduler.load(Arc::clone(&sequence));
    scheduler.play();

    log::info!(
        "Simulating {} at {:.1}x with {} ms frames",
        args.shared.midi.display(),
        scheduler.speed(),
        args.frame_ms
    );

    let mut keyboard = KeyboardState::new();
    let mut frames = 0u64;
    let mut presses = 0usize;
    let mut peak_held = 0usize;

    while !scheduler.is_finished() {
        let signals = scheduler.tick(args.frame_ms).signals;
        let clock = format_ms(scheduler.clock_ms());
        for signal in &signals {
            keyboard.apply(signal);
            match signal {
                NoteSignal::Press { note, velocity, track } => {
                    presses += 1;
                    println!(
                        "{}  press    {:<4} vel {:>3}  track {}",
                        clock,
                        note_name(*note),
                        velocity,
                        track
                    );
                }
                NoteSignal::Release { note, track } => println!(
                    "{}  release  {:<4}          track {}",
                    clock,
                    note_name(*note),
                    track
                ),
            }
        }
        peak_held = peak_held.max(keyboard.pressed_notes().count());
        frames += 1;
    }

    let end = scheduler.clock_ms();
    let held_at_end = scheduler.stop();
    if !held_at_end.is_empty() {
        log::warn!("{} notes were never released", held_at_end.len());
    }
    keyboard.release_all();

    log::info!(
        "Played {} of {} notes in {} frames ({}), peak {} keys held",
        presses,
        sequence.note_on_count(),
        frames,
        format_ms(end),
        peak_held
    );
    Ok(())
}
