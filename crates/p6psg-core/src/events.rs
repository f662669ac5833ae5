//! Driver output interface: register writes and note events.
//!
//! The driver does not own its outputs. Every `tick` receives a sink, the
//! same way the GIST-style drivers receive the chip they write to, so hosts
//! can route the stream to a hardware backend, a recorder, a UI, or any
//! combination without the driver knowing.

/// One decoded note or rest, reported exactly once per decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// Voice index 0..=2 (A, B, C).
    pub channel: u8,
    /// Octave in effect when the note was decoded.
    pub octave: u8,
    /// 0 for a rest, 1..=12 for C..B.
    pub note: u8,
    /// Amplitude value written for this note (already envelope-adjusted
    /// on tied notes).
    pub volume: u8,
    /// Note length in channel ticks.
    pub len: u16,
    /// True when the object was a rest.
    pub is_rest: bool,
    /// Song tempo at decode time, BPM x 10.
    pub bpm_x10: u16,
}

/// Receiver for everything the driver emits during a tick.
///
/// `write_reg` carries the exact byte the chip should receive. Both hooks
/// are infallible from the driver's point of view; a fallible backend caches
/// its own error (see `BackendSink`).
pub trait DriverSink {
    /// Deliver one register write (`reg` 0..=15).
    fn write_reg(&mut self, reg: u8, val: u8);

    /// Observe a decoded note or rest. Default: ignore.
    fn note_event(&mut self, _event: &NoteEvent) {}
}

/// Fans driver output to two sinks, primary first.
///
/// The usual pairing is a hardware backend plus a UI observer.
pub struct Fanout<A, B> {
    /// First receiver of every write and event.
    pub primary: A,
    /// Second receiver.
    pub secondary: B,
}

impl<A, B> Fanout<A, B> {
    /// Pair two sinks.
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: DriverSink, B: DriverSink> DriverSink for Fanout<A, B> {
    fn write_reg(&mut self, reg: u8, val: u8) {
        self.primary.write_reg(reg, val);
        self.secondary.write_reg(reg, val);
    }

    fn note_event(&mut self, event: &NoteEvent) {
        self.primary.note_event(event);
        self.secondary.note_event(event);
    }
}

impl<S: DriverSink + ?Sized> DriverSink for &mut S {
    fn write_reg(&mut self, reg: u8, val: u8) {
        (**self).write_reg(reg, val);
    }

    fn note_event(&mut self, event: &NoteEvent) {
        (**self).note_event(event);
    }
}
