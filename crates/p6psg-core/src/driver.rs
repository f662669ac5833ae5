//! The driver proper: three channels, shared register shadows, and the
//! 2 ms tempo dispatch.
//!
//! One driver instance belongs to one host thread. `tick` runs to
//! completion, never blocks, and may be called repeatedly to catch up on
//! missed ticks; each call is exactly one 2 ms step.

use std::sync::Arc;

use crate::channel::Channel;
use crate::events::DriverSink;
use crate::registers::{AVOL, CHANNEL_COUNT, ENABLE, ENABLE_DEFAULT, NOISEPER, NOISEPER_DEFAULT};
use crate::sequencer::channel_tick;
use crate::tempo::Tempo;

/// Build-time policies of the original driver, surfaced as options.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Keep the vibrato LFO running through tied notes instead of
    /// restarting it at every note. Default: keep.
    pub keep_vibrato_tie: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            keep_vibrato_tie: true,
        }
    }
}

/// State shared by all three channels: tempo, the reg 6/7 shadows, and the
/// host-visible scratch values.
#[derive(Debug, Clone)]
pub(crate) struct Shared {
    pub tempo: Tempo,
    pub reg6: u8,
    pub reg7: u8,
    pub i_command: u8,
    // Fade slots exist in the original driver's work area but no bytecode
    // command drives them; they stay dormant here as well.
    #[allow(dead_code)]
    pub fade_value: u8,
    #[allow(dead_code)]
    pub fade_step: i8,
    #[allow(dead_code)]
    pub fade_active: bool,
    pub unknown_opcodes: u32,
    pub debug: bool,
}

impl Shared {
    fn new() -> Self {
        Self {
            tempo: Tempo::new(),
            reg6: NOISEPER_DEFAULT,
            reg7: ENABLE_DEFAULT,
            i_command: 0,
            fade_value: 0,
            fade_step: 0,
            fade_active: false,
            unknown_opcodes: 0,
            debug: false,
        }
    }
}

/// The PC-6001 PSG music driver.
///
/// Outputs are injected per call as a [`DriverSink`]; the driver owns
/// neither the backend nor the UI.
pub struct PsgDriver {
    shared: Shared,
    channels: [Channel; CHANNEL_COUNT],
    options: DriverOptions,
    tick_count: u64,
}

impl Default for PsgDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PsgDriver {
    /// Driver with default options.
    pub fn new() -> Self {
        Self::with_options(DriverOptions::default())
    }

    /// Driver with explicit policy options.
    pub fn with_options(options: DriverOptions) -> Self {
        let mut channels: [Channel; CHANNEL_COUNT] = Default::default();
        for (index, ch) in channels.iter_mut().enumerate() {
            ch.reset(index);
        }
        Self {
            shared: Shared::new(),
            channels,
            options,
            tick_count: 0,
        }
    }

    /// Reset to the documented defaults and write the initial shared
    /// registers (mixer `0xF8`, noise period `0xC0`) through the sink.
    ///
    /// Safe to call again between songs; the result is identical to a
    /// freshly constructed driver.
    pub fn init(&mut self, sink: &mut impl DriverSink) {
        let debug = self.shared.debug;
        self.shared = Shared::new();
        self.shared.debug = debug;
        self.tick_count = 0;
        for (index, ch) in self.channels.iter_mut().enumerate() {
            ch.reset(index);
        }
        sink.write_reg(ENABLE, ENABLE_DEFAULT);
        sink.write_reg(NOISEPER, NOISEPER_DEFAULT);
    }

    /// Hand a channel its bytecode stream and arm it. Indices outside
    /// 0..=2 are ignored.
    pub fn set_channel_data(&mut self, index: usize, data: Arc<[u8]>) {
        if let Some(ch) = self.channels.get_mut(index) {
            ch.load(data);
        }
    }

    /// Re-arm every channel that has data so the next channel tick decodes
    /// from the start of its stream.
    pub fn start(&mut self) {
        for ch in &mut self.channels {
            ch.wait_counter = 1;
            ch.offset = 0;
            ch.active = ch.data.is_some();
        }
    }

    /// Stop playback, muting all three voices.
    pub fn stop(&mut self, sink: &mut impl DriverSink) {
        for ch in &mut self.channels {
            ch.active = false;
            ch.wait_counter = 0;
            sink.write_reg(AVOL + ch.channel_index, 0);
        }
    }

    /// One 2 ms host tick. When the tempo divider fires, the three channel
    /// ticks run in order A, B, C.
    pub fn tick(&mut self, sink: &mut impl DriverSink) {
        self.tick_count += 1;
        if self.shared.tempo.countdown() {
            let Self {
                shared,
                channels,
                options,
                ..
            } = self;
            for ch in channels.iter_mut() {
                channel_tick(shared, ch, options, &mut *sink);
            }
            shared.tempo.reload();
        }
    }

    /// True while any voice is still consuming its stream.
    pub fn is_playing(&self) -> bool {
        self.channels.iter().any(|ch| ch.active)
    }

    /// Borrow a channel's state for inspection. `None` outside 0..=2.
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Host ticks elapsed since construction or the last `init`.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Current tempo in BPM x 10.
    pub fn bpm_x10(&self) -> u16 {
        self.shared.tempo.bpm_x10()
    }

    /// Current tempo byte (2 ms ticks per 96th note).
    pub fn t96(&self) -> u8 {
        self.shared.tempo.t96()
    }

    /// Value most recently stored by the `I` command.
    pub fn i_command_value(&self) -> u8 {
        self.shared.i_command
    }

    /// Shadow of the shared noise period register.
    pub fn reg6_value(&self) -> u8 {
        self.shared.reg6
    }

    /// Shadow of the shared mixer register.
    pub fn reg7_value(&self) -> u8 {
        self.shared.reg7
    }

    /// How many unknown opcodes the interpreter has skipped.
    pub fn unknown_opcode_count(&self) -> u32 {
        self.shared.unknown_opcodes
    }

    /// Print a diagnostic line for every skipped unknown opcode.
    pub fn set_debug(&mut self, enabled: bool) {
        self.shared.debug = enabled;
    }
}
