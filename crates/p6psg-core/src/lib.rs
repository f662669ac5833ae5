//! PC-6001 PSG music driver.
//!
//! Interprets the PC-6001 PSG bytecode format — three voices of compact
//! command/note objects — at a fixed 2 ms host tick and emits AY-3-8910 /
//! YM2149F register writes through a pluggable sink. No audio is
//! synthesized here; the chip (real or emulated) does that.
//!
//! # Architecture
//! - [`PsgDriver`] owns the three channel state machines, the tempo
//!   divider, and the shadows of the shared noise/mixer registers.
//! - Output is injected per tick: [`DriverSink`] receives register writes
//!   and per-note events, [`Fanout`] splits the stream, and
//!   [`BackendSink`] bridges to a fallible [`PsgBackend`].
//! - Song data comes from the `p6psg-loader` crate (or any three byte
//!   slices ending in `0xFF`).
//!
//! # Quick start
//! ```
//! use std::sync::Arc;
//! use p6psg_core::{CaptureBackend, BackendSink, PsgDriver};
//!
//! // o5 v15, a one-byte-length C note, end mark.
//! let song: Arc<[u8]> = Arc::from(&[0x85, 0x9F, 0x21, 96, 0xFF][..]);
//!
//! let mut sink = BackendSink::new(CaptureBackend::new());
//! let mut driver = PsgDriver::new();
//! driver.init(&mut sink);
//! driver.set_channel_data(0, song);
//! while driver.is_playing() {
//!     driver.tick(&mut sink); // every 2 ms in a real host
//! }
//! ```

#![warn(missing_docs)]

pub mod backend;
mod channel;
mod driver;
mod events;
pub mod registers;
mod sequencer;
pub mod tempo;
pub mod tone;

pub use backend::{BackendError, BackendSink, CaptureBackend, NullBackend, PsgBackend};
pub use channel::Channel;
pub use driver::{DriverOptions, PsgDriver};
pub use events::{DriverSink, Fanout, NoteEvent};
