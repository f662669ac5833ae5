//! Terminal player for PC-6001 PSG song files.
//!
//! Loads a song (or the built-in demo), runs the driver at its 2 ms tick
//! cadence, and shows playback in a terminal UI. With `--log-writes` every
//! PSG register write is printed instead, which is handy for comparing
//! against a hardware trace.

mod args;
mod demo;
mod host;
mod tui;

use std::error::Error;
use std::path::Path;
use std::time::Instant;

use p6psg_core::{BackendSink, DriverSink, NoteEvent, NullBackend, PsgDriver};
use p6psg_loader::Song;

use args::CliArgs;
use host::TickScheduler;

fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();
    if args.show_help {
        CliArgs::print_help();
        return Ok(());
    }

    let (song, title) = match &args.file_path {
        Some(path) => (p6psg_loader::load_file(path)?, title_for(path)),
        None => (demo::demo_song()?, "Built-in demo".to_string()),
    };

    if args.no_tui {
        run_headless(&song, &args);
    } else {
        tui::run(&song, &title, args.debug)?;
    }
    Ok(())
}

fn title_for(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Sink that mirrors the original player's register-write trace output.
struct LogSink;

impl DriverSink for LogSink {
    fn write_reg(&mut self, reg: u8, val: u8) {
        println!("write_reg: reg: {reg:2x}, val: {val:2x}");
    }

    fn note_event(&mut self, ev: &NoteEvent) {
        println!(
            "note_event: ch: {}, o{} n{:2} v{:2} len {:3}{}",
            ev.channel,
            ev.octave,
            ev.note,
            ev.volume,
            ev.len,
            if ev.is_rest { " (rest)" } else { "" }
        );
    }
}

fn run_headless(song: &Song, args: &CliArgs) {
    let mut driver = PsgDriver::new();
    driver.set_debug(args.debug);

    if args.log_writes {
        let mut sink = LogSink;
        play_to_end(&mut driver, &mut sink, song);
    } else {
        let mut sink = BackendSink::new(NullBackend);
        play_to_end(&mut driver, &mut sink, song);
    }

    println!(
        "Done: {} host ticks ({:.1}s), {} unknown opcodes",
        driver.tick_count(),
        driver.tick_count() as f64 * 0.002,
        driver.unknown_opcode_count()
    );
}

fn play_to_end(driver: &mut PsgDriver, sink: &mut impl DriverSink, song: &Song) {
    driver.init(sink);
    for ch in 0..3 {
        driver.set_channel_data(ch, song.channel(ch));
    }
    driver.start();

    let mut scheduler = TickScheduler::new(Instant::now());
    while driver.is_playing() {
        std::thread::sleep(
            scheduler
                .next_deadline()
                .saturating_duration_since(Instant::now()),
        );
        for _ in 0..scheduler.due_ticks(Instant::now()) {
            driver.tick(sink);
        }
    }
    driver.stop(sink);
}
