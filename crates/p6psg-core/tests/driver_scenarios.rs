//! End-to-end driver scenarios: bytecode in, register writes and note
//! events out, observed through a recording sink at the default tempo
//! (ten 2 ms host ticks per channel tick).

use std::sync::Arc;

use p6psg_core::registers::{ACOARSE, AFINE, AVOL, ENABLE, NOISEPER};
use p6psg_core::{DriverSink, NoteEvent, PsgDriver};

#[derive(Default)]
struct Recorder {
    writes: Vec<(u8, u8)>,
    events: Vec<NoteEvent>,
}

impl DriverSink for Recorder {
    fn write_reg(&mut self, reg: u8, val: u8) {
        self.writes.push((reg, val));
    }

    fn note_event(&mut self, event: &NoteEvent) {
        self.events.push(*event);
    }
}

impl Recorder {
    fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }
}

/// Init a driver, load the given streams, and clear the init writes so
/// tests only see playback output.
fn driver_with(streams: &[&[u8]]) -> (PsgDriver, Recorder) {
    let mut recorder = Recorder::default();
    let mut driver = PsgDriver::new();
    driver.init(&mut recorder);
    assert_eq!(
        recorder.writes,
        vec![(ENABLE, 0xF8), (NOISEPER, 0xC0)],
        "init writes the shared register defaults"
    );
    recorder.writes.clear();
    for (index, stream) in streams.iter().enumerate() {
        driver.set_channel_data(index, Arc::from(*stream));
    }
    (driver, recorder)
}

/// Run enough host ticks for `n` channel ticks at the default tempo.
fn run_channel_ticks(driver: &mut PsgDriver, recorder: &mut Recorder, n: usize) {
    for _ in 0..n * 10 {
        driver.tick(recorder);
    }
}

#[test]
fn minimal_song() {
    let (mut driver, mut rec) = driver_with(&[&[0x85, 0x9F, 0x21, 96, 0xFF]]);

    // First channel tick decodes the note.
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(rec.events.len(), 1);
    let ev = rec.events[0];
    assert_eq!(
        (ev.channel, ev.octave, ev.note, ev.volume, ev.len, ev.is_rest),
        (0, 5, 1, 15, 96, false)
    );
    assert_eq!(ev.bpm_x10, 1250);

    // Mute, tone fine, tone coarse, volume -- in that order.
    assert_eq!(
        rec.writes,
        vec![(AVOL, 0), (AFINE, 0xEE), (ACOARSE, 0x00), (AVOL, 15)]
    );

    // The note lasts 96 channel ticks, then the end mark stops the voice.
    run_channel_ticks(&mut driver, &mut rec, 95);
    assert!(driver.is_playing());
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert!(!driver.is_playing());
    assert_eq!(rec.events.len(), 1, "envelope-only ticks emit no events");
}

#[test]
fn rest_mutes_once_and_stays_silent() {
    let (mut driver, mut rec) = driver_with(&[&[0x20, 48, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(rec.events.len(), 1);
    assert!(rec.events[0].is_rest);
    assert_eq!(rec.events[0].len, 48);
    assert_eq!(rec.writes, vec![(AVOL, 0)]);

    // No further writes while the rest runs out.
    run_channel_ticks(&mut driver, &mut rec, 47);
    assert_eq!(rec.writes.len(), 1);
    assert!(driver.is_playing());
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert!(!driver.is_playing());
}

#[test]
fn tie_preserves_envelope_and_skips_the_mute() {
    // S 3,2,1,0,0 then a tied eighth note into a plain one.
    let (mut driver, mut rec) =
        driver_with(&[&[0xEA, 3, 2, 1, 0, 0, 0x61, 8, 0x21, 8, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(rec.events.len(), 1);
    // Fresh note: mute first, then tone, then the raw channel volume.
    assert_eq!(
        rec.writes,
        vec![(AVOL, 0), (AFINE, 0xDD), (ACOARSE, 0x01), (AVOL, 12)]
    );
    rec.writes.clear();

    // The envelope ramps +1 every second tick up to the width of 3.
    run_channel_ticks(&mut driver, &mut rec, 7);
    assert_eq!(rec.writes_to(AVOL), vec![13, 14, 15]);
    rec.writes.clear();

    // Tied continuation: no mute, tone rewrite, adjusted volume.
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(rec.events.len(), 2);
    assert_eq!(
        rec.writes,
        vec![(AFINE, 0xDD), (ACOARSE, 0x01), (AVOL, 15)]
    );
    assert_eq!(rec.events[1].volume, 15);
}

#[test]
fn nested_loop_plays_three_times() {
    let (mut driver, mut rec) = driver_with(&[&[0xF0, 3, 0x21, 8, 0xF1, 3, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 3 * 8 + 1);
    assert!(!driver.is_playing());
    assert_eq!(rec.events.len(), 3);
    assert!(rec.events.iter().all(|ev| ev.note == 1 && !ev.is_rest));
}

#[test]
fn loop_restores_octave_and_lengths() {
    // o5 [2 C8 o3 B8 ]  -- the loop body changes the octave; the second
    // iteration must start from the snapshot again.
    let (mut driver, mut rec) =
        driver_with(&[&[0x85, 0xF0, 2, 0x21, 8, 0x83, 0x2C, 8, 0xF1, 6, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 4 * 8 + 1);
    assert!(!driver.is_playing());
    let octaves: Vec<u8> = rec.events.iter().map(|ev| ev.octave).collect();
    assert_eq!(octaves, vec![5, 3, 5, 3]);
}

#[test]
fn mixer_bits_are_independent_per_channel() {
    // P2 (tone off, noise on) on channels A and B; C untouched.
    let (mut driver, mut rec) = driver_with(&[&[0xEE, 0xFF], &[0xEE, 0xFF], &[0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(rec.writes_to(ENABLE), vec![0xF1, 0xE3]);
    assert_eq!(driver.reg7_value(), 0xE3);
    // Channel C's bits keep their init values: tone enabled, noise off.
    assert_eq!(driver.reg7_value() & 0x04, 0);
    assert_ne!(driver.reg7_value() & 0x20, 0);
}

#[test]
fn catch_up_ticks_run_exactly_the_due_channel_ticks() {
    let (mut driver, mut rec) = driver_with(&[&[0x21, 1, 0x21, 1, 0x21, 1, 0xFF]]);

    // 20 back-to-back host ticks = 2 channel ticks at tempo 10.
    for _ in 0..20 {
        driver.tick(&mut rec);
    }
    assert_eq!(rec.events.len(), 2);
}

#[test]
fn gate_cuts_the_note_at_the_q_threshold() {
    let (mut driver, mut rec) = driver_with(&[&[0xFA, 4, 0x21, 8, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 1);
    rec.writes.clear();

    // wait counts 7,6,5 silently; at 4 the gate mutes the voice.
    run_channel_ticks(&mut driver, &mut rec, 3);
    assert!(rec.writes.is_empty());
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(rec.writes, vec![(AVOL, 0)]);

    // Resting until the wait runs out; nothing further is written.
    run_channel_ticks(&mut driver, &mut rec, 3);
    assert_eq!(rec.writes.len(), 1);
    assert!(driver.is_playing());
}

#[test]
fn vibrato_perturbs_the_period_every_lfo_step() {
    // M wait=0 count=1 amp=0 delta=+2, then a long note.
    let (mut driver, mut rec) = driver_with(&[&[0xF5, 0, 1, 0, 2, 0x21, 10, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 1);
    rec.writes.clear();

    run_channel_ticks(&mut driver, &mut rec, 3);
    assert_eq!(
        rec.writes,
        vec![
            (AFINE, 0xDF),
            (ACOARSE, 0x01),
            (AFINE, 0xE1),
            (ACOARSE, 0x01),
            (AFINE, 0xE3),
            (ACOARSE, 0x01),
        ]
    );
}

#[test]
fn detune_shifts_the_emitted_period() {
    // U% +5 raises the pitch: period 0x1DD - 5 = 0x1D8.
    let (mut driver, mut rec) = driver_with(&[&[0xFB, 0x05, 0x21, 8, 0xFF]]);
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(
        rec.writes,
        vec![(AVOL, 0), (AFINE, 0xD8), (ACOARSE, 0x01), (AVOL, 12)]
    );
}

#[test]
fn noise_commands_update_the_shared_shadow() {
    let (mut driver, mut rec) = driver_with(&[&[0xEB, 0x10, 0xEC, 0xF8, 0x21, 8, 0xFF]]);
    run_channel_ticks(&mut driver, &mut rec, 1);
    // W 0x10 then W± -8 clamps inside 0..=31.
    assert_eq!(rec.writes_to(NOISEPER), vec![0x10, 0x08]);
    assert_eq!(driver.reg6_value(), 0x08);
}

#[test]
fn jump_return_loops_forever_and_restores_the_octave() {
    let (mut driver, mut rec) =
        driver_with(&[&[0x85, 0xFE, 0x21, 8, 0x83, 0x2C, 8, 0xFF]]);

    run_channel_ticks(&mut driver, &mut rec, 5 * 8);
    assert!(driver.is_playing(), "J-looped song never ends on its own");
    let octaves: Vec<u8> = rec.events.iter().map(|ev| ev.octave).collect();
    // C at o5, B at o3, then the end mark restores o5 and repeats.
    assert_eq!(&octaves[..4], &[5, 3, 5, 3]);
}

#[test]
fn unknown_opcode_is_counted_and_skipped() {
    let (mut driver, mut rec) = driver_with(&[&[0xC5, 0x21, 8, 0xFF]]);
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(driver.unknown_opcode_count(), 1);
    assert_eq!(rec.events.len(), 1, "decode resyncs on the next object");
}

#[test]
fn missing_end_mark_deactivates_at_the_slice_end() {
    let (mut driver, mut rec) = driver_with(&[&[0x21, 2]]);
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert!(driver.is_playing());
    run_channel_ticks(&mut driver, &mut rec, 2);
    assert!(!driver.is_playing());
}

#[test]
fn i_command_is_host_readable() {
    let (mut driver, mut rec) = driver_with(&[&[0xF4, 0x42, 0x21, 8, 0xFF]]);
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(driver.i_command_value(), 0x42);
}

#[test]
fn tempo_command_changes_the_channel_tick_rate() {
    // T 5 (legacy byte consumed), then two short notes.
    let (mut driver, mut rec) = driver_with(&[&[0xF8, 5, 0xB6, 0x21, 1, 0x21, 1, 0xFF]]);

    // First channel tick still happens on the old countdown.
    for _ in 0..10 {
        driver.tick(&mut rec);
    }
    assert_eq!(rec.events.len(), 1);
    assert_eq!(driver.bpm_x10(), 2500);

    // From here on a channel tick fires every 5 host ticks.
    for _ in 0..5 {
        driver.tick(&mut rec);
    }
    assert_eq!(rec.events.len(), 2);
}

#[test]
fn init_is_idempotent_and_stop_mutes_everything() {
    let (mut driver, mut rec) = driver_with(&[&[0x83, 0x95, 0xF8, 20, 0xB6, 0x21, 8, 0xFF]]);
    run_channel_ticks(&mut driver, &mut rec, 1);
    assert_eq!(driver.t96(), 20);

    driver.stop(&mut rec);
    let tail: Vec<(u8, u8)> = rec.writes[rec.writes.len() - 3..].to_vec();
    assert_eq!(tail, vec![(AVOL, 0), (AVOL + 1, 0), (AVOL + 2, 0)]);
    assert!(!driver.is_playing());

    driver.init(&mut rec);
    assert_eq!(driver.t96(), 10);
    assert_eq!(driver.bpm_x10(), 1250);
    assert_eq!(driver.reg7_value(), 0xF8);
    assert_eq!(driver.reg6_value(), 0xC0);
    let ch = driver.channel(0).unwrap();
    assert_eq!((ch.volume(), ch.octave()), (12, 4));
    assert!(!ch.is_active());
}
