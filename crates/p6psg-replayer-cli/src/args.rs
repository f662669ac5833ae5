//! Command-line argument parsing for the PSG player.

use std::env;

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Song file to play; the built-in demo when absent.
    pub file_path: Option<String>,
    /// Run without the terminal UI.
    pub no_tui: bool,
    /// Print every register write (implies `--no-tui`).
    pub log_writes: bool,
    /// Enable driver diagnostics (unknown opcode reports).
    pub debug: bool,
    /// Whether help was requested (or an argument error occurred).
    pub show_help: bool,
}

impl CliArgs {
    /// Parse arguments from the process command line.
    pub fn parse() -> Self {
        let mut args = Self::default();

        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--no-tui" => args.no_tui = true,
                "--log-writes" => {
                    args.log_writes = true;
                    args.no_tui = true;
                }
                "--debug" => args.debug = true,
                "--help" | "-h" => args.show_help = true,
                _ if arg.starts_with('-') => {
                    eprintln!("Unknown flag: {}", arg);
                    args.show_help = true;
                }
                _ => args.file_path = Some(arg),
            }
        }

        args
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  p6psg-play [--no-tui] [--log-writes] [--debug] [file.p6psg]\n\n\
             Flags:\n\
             \x20 --no-tui        Play headless (no terminal UI)\n\
             \x20 --log-writes    Print every PSG register write (implies --no-tui)\n\
             \x20 --debug         Report unknown bytecode commands while playing\n\
             \x20 -h, --help      Show this help\n\n\
             Without a file the built-in demo song is played.\n\n\
             File format: 8-byte header (three little-endian channel start\n\
             addresses) followed by three bytecode streams ending in FFh.\n"
        );
    }
}
