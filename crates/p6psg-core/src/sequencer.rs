//! The bytecode interpreter and per-tick voicing engine.
//!
//! Each channel tick either advances the note in flight (gate check, LFO
//! step, envelope step) or, once the wait counter runs out, decodes command
//! objects until the next note object lands. A note object always ends the
//! decode for that tick; command objects are free.
//!
//! Register-write ordering within a tick is part of the contract: a fresh
//! (untied) note writes mute, tone fine, tone coarse, then the final
//! amplitude, so the old tone never sounds at the new volume.

use crate::channel::{Channel, MAX_NEST_DEPTH};
use crate::driver::{DriverOptions, Shared};
use crate::events::{DriverSink, NoteEvent};
use crate::registers::{AVOL, ACOARSE, AFINE, ENABLE, MAX_NOISE_PERIOD, NOISEPER};
use crate::registers::{noise_bit, tone_bit};
use crate::tone::{apply_detune, clamp_emitted_period, detune_add, tone_period};

/// Run one channel tick: advance the current note or decode the next one.
pub(crate) fn channel_tick(
    shared: &mut Shared,
    ch: &mut Channel,
    options: &DriverOptions,
    sink: &mut dyn DriverSink,
) {
    if !ch.active {
        return;
    }

    if ch.wait_counter > 0 {
        ch.wait_counter -= 1;
        if ch.wait_counter > 0 {
            advance_note(ch, sink);
            return;
        }
    }

    if decode(shared, ch, options, sink).is_none() {
        // Ran off the stream without an end marker; same as hitting one.
        ch.active = false;
    }
}

/// Per-tick work while a note is sounding (§ voicing engine).
fn advance_note(ch: &mut Channel, sink: &mut dyn DriverSink) {
    if ch.flags.rest {
        return;
    }

    // Gate: force the amplitude to zero once the remaining ticks reach the
    // Q threshold; the wait keeps running silently.
    if ch.wait_counter == ch.q_counter as u16 {
        sink.write_reg(AVOL + ch.channel_index, 0);
        ch.flags.rest = true;
        return;
    }

    // ----- vibrato LFO -----
    if ch.flags.vib_on {
        if ch.vib_wait_work > 0 {
            ch.vib_wait_work -= 1;
            return;
        }
        ch.vib_count_work = ch.vib_count_work.saturating_sub(1);
        if ch.vib_count_work > 0 {
            return;
        }
        ch.vib_count_work = ch.vib_count_base.max(1);

        let step = ((ch.vib_delta_base as u8) & 0x7F) as i16;
        if ch.flags.vib_pm {
            ch.vib_offset = ch.vib_offset.saturating_sub(step);
        } else {
            ch.vib_offset = ch.vib_offset.saturating_add(step);
        }
        write_tone(sink, ch.channel_index, ch.freq_value as i32 + ch.vib_offset as i32);

        if ch.vib_amp_base != 0 {
            ch.vib_amp_work = ch.vib_amp_work.saturating_sub(1);
            if ch.vib_amp_work == 0 {
                ch.vib_amp_work = ch.vib_amp_base;
                ch.flags.vib_pm = !ch.flags.vib_pm;
            }
        }
    }

    // ----- software envelope -----
    if ch.eg_width_base != 0 {
        eg_step(ch, sink);
    }
}

/// Advance the two-stage software envelope and emit the adjusted volume.
fn eg_step(ch: &mut Channel, sink: &mut dyn DriverSink) {
    if !ch.flags.eg_stage2 {
        ch.eg_count_work = ch.eg_count_work.saturating_sub(1);
        if ch.eg_count_work > 0 {
            return;
        }
        if ch.eg_width_work != ch.eg_width_base {
            // Still ramping toward the programmed width.
            ch.eg_count_work = ch.eg_count_base;
            ch.eg_width_work = ch.eg_width_work.wrapping_add(ch.eg_delta_base);
            ch.volume_adjust = ch.eg_width_work;
            write_volume(sink, ch.channel_index, ch.volume, ch.volume_adjust);
        } else {
            // Ramp complete: move to the second stage.
            ch.flags.eg_stage2 = true;
            ch.eg_width_work = 0;
            ch.eg_count_work = ch.eg2_count_base & 0x7F;
            if ch.eg2_width_base != 0 {
                ch.volume_adjust = ch.eg2_width_base.wrapping_add(ch.eg_width_base);
                write_volume(sink, ch.channel_index, ch.volume, ch.volume_adjust);
            }
        }
    } else {
        if ch.eg2_width_base == 0 {
            return;
        }
        ch.eg_count_work = ch.eg_count_work.saturating_sub(1);
        if ch.eg_count_work > 0 {
            return;
        }
        ch.eg_count_work = ch.eg2_count_base & 0x7F;
        if ch.eg_width_work < 15 {
            ch.eg_width_work += 1;
        }
        // Bit 7 of the stage-2 counter byte inverts the sweep direction.
        let delta = if ch.eg2_count_base & 0x80 != 0 {
            -ch.eg_width_work
        } else {
            ch.eg_width_work
        };
        ch.volume_adjust = delta
            .wrapping_add(ch.eg_width_base)
            .wrapping_add(ch.eg2_width_base);
        write_volume(sink, ch.channel_index, ch.volume, ch.volume_adjust);
    }
}

/// Consume command objects until a note object is processed.
///
/// Returns `None` when the cursor ran past the end of the stream mid-object.
fn decode(
    shared: &mut Shared,
    ch: &mut Channel,
    options: &DriverOptions,
    sink: &mut dyn DriverSink,
) -> Option<()> {
    // An end marker with a jump return continues the decode; a second one
    // without a note in between means the looped region is note-free, and
    // looping it forever would hang the tick.
    let mut end_jumps = 0u8;

    loop {
        let code = ch.read()?;

        if code & 0x80 == 0 {
            process_note(shared, ch, options, sink, code)?;
            return Some(());
        }

        match code & 0xF0 {
            0x80 => {
                ch.octave = code & 0x0F;
                continue;
            }
            0x90 => {
                ch.volume = code & 0x0F;
                continue;
            }
            0xA0 => {
                ch.volume = (ch.volume + (code & 0x0F)).min(15);
                continue;
            }
            0xB0 => {
                ch.volume = ch.volume.saturating_sub(code & 0x0F);
                continue;
            }
            _ => {}
        }

        match code {
            // S: program the software envelope. A zero width disables it
            // and carries no further operands.
            0xEA => {
                ch.eg_width_base = ch.read()? as i8;
                if ch.eg_width_base != 0 {
                    ch.eg_count_base = ch.read()?;
                    ch.eg_delta_base = ch.read()? as i8;
                    ch.eg2_width_base = ch.read()? as i8;
                    ch.eg2_count_base = ch.read()?;
                }
            }
            // W: absolute noise period.
            0xEB => {
                let val = ch.read()?;
                shared.reg6 = val;
                sink.write_reg(NOISEPER, val);
            }
            // W±: relative noise period against the shadow.
            0xEC => {
                let delta = ch.read()? as i8;
                let val =
                    (shared.reg6 as i32 + delta as i32).clamp(0, MAX_NOISE_PERIOD as i32) as u8;
                shared.reg6 = val;
                sink.write_reg(NOISEPER, val);
            }
            // P1/P2/P3: this channel's two mixer bits. Operand-free; the
            // low opcode bits select tone (bit 0) and noise (bit 1), set
            // meaning enabled (the mixer register itself is active-low).
            0xED..=0xEF => {
                let tbit = tone_bit(ch.channel_index as usize);
                let nbit = noise_bit(ch.channel_index as usize);
                let mut reg7 = shared.reg7;
                if code & 0x01 != 0 {
                    reg7 &= !tbit;
                } else {
                    reg7 |= tbit;
                }
                if code & 0x02 != 0 {
                    reg7 &= !nbit;
                } else {
                    reg7 |= nbit;
                }
                shared.reg7 = reg7;
                sink.write_reg(ENABLE, reg7);
            }
            // [: enter a nest level and snapshot the loop-scoped defaults.
            0xF0 => {
                let count = ch.read()?;
                if ch.flags.nest_depth < MAX_NEST_DEPTH {
                    ch.nest_flag[ch.flags.nest_depth as usize] = count;
                    ch.flags.nest_depth += 1;
                    ch.l_backup = ch.l_default;
                    ch.lplus_backup = ch.lplus_default;
                    ch.nest_octave_backup = ch.octave;
                }
            }
            // ]: loop back by a one-byte backward offset.
            0xF1 => {
                let operand_pos = ch.offset;
                let back = ch.read()? as usize;
                loop_back(ch, operand_pos, back);
            }
            // ]: loop back, two-byte backward offset.
            0xF2 => {
                let operand_pos = ch.offset;
                let lo = ch.read()?;
                let hi = ch.read()?;
                loop_back(ch, operand_pos, u16::from_le_bytes([lo, hi]) as usize);
            }
            // :: on the last iteration, pop the nest and skip forward past
            // the remainder of the loop body.
            0xF3 => {
                let lo = ch.read()?;
                let hi = ch.read()?;
                let forward = u16::from_le_bytes([lo, hi]) as usize;
                let depth = ch.flags.nest_depth;
                if depth > 0 && ch.nest_flag[(depth - 1) as usize] == 1 {
                    ch.flags.nest_depth -= 1;
                    ch.offset += forward;
                }
            }
            // I: host-readable scratch byte.
            0xF4 => {
                shared.i_command = ch.read()?;
            }
            // M: program the vibrato LFO and restart it.
            0xF5 => {
                ch.vib_wait_base = ch.read()?;
                ch.vib_count_base = ch.read()?;
                ch.vib_amp_base = ch.read()?.wrapping_mul(2);
                let delta = ch.read()?;
                ch.vib_delta_base = delta as i8;
                ch.flags.vib_on = delta != 0;
                ch.lfo_init();
            }
            // N: reserved LFO toggle.
            0xF6 => {}
            // L+: long default length.
            0xF7 => {
                ch.lplus_default = ch.read()?;
            }
            // T: tempo byte plus a legacy port value that is consumed and
            // discarded.
            0xF8 => {
                let t96 = ch.read()?;
                let _legacy = ch.read()?;
                shared.tempo.set(t96);
            }
            // L: default length.
            0xF9 => {
                ch.l_default = ch.read()?;
            }
            // Q: gate threshold default.
            0xFA => {
                ch.q_default = ch.read()?;
            }
            // U%: absolute sign-magnitude detune.
            0xFB => {
                ch.detune = ch.read()?;
            }
            // U±: signed add into the sign-magnitude detune.
            0xFC => {
                let delta = ch.read()? as i8;
                ch.detune = detune_add(ch.detune, delta);
            }
            // M%: replace the LFO delta only.
            0xFD => {
                let val = ch.read()?;
                ch.vib_delta_base = val as i8;
                ch.flags.vib_on = val != 0;
            }
            // J: remember the return point for the end marker.
            0xFE => {
                ch.j_return_offset = ch.offset as u16;
                ch.jump_octave_backup = ch.octave;
            }
            // End marker: jump back if a return point is set, else stop.
            0xFF => {
                if ch.j_return_offset != 0 {
                    end_jumps += 1;
                    if end_jumps > 1 {
                        ch.active = false;
                        return Some(());
                    }
                    ch.offset = ch.j_return_offset as usize;
                    ch.octave = ch.jump_octave_backup;
                } else {
                    ch.active = false;
                    return Some(());
                }
            }
            // Unknown opcode: count it and resync on the next byte without
            // consuming operands (the operand count is unknown).
            _ => {
                shared.unknown_opcodes += 1;
                if shared.debug {
                    println!(
                        "ch {} unknown command: {code:02x} at offset {}",
                        ch.channel_index,
                        ch.offset - 1
                    );
                }
            }
        }
    }
}

/// Decrement the innermost loop counter and either jump back or fall out.
///
/// Backward offsets are magnitudes measured from the operand's own
/// position; forward jumps are not representable in this form.
fn loop_back(ch: &mut Channel, operand_pos: usize, back: usize) {
    let depth = ch.flags.nest_depth;
    if depth == 0 {
        return;
    }
    let top = (depth - 1) as usize;
    ch.nest_flag[top] = ch.nest_flag[top].saturating_sub(1);
    if ch.nest_flag[top] != 0 {
        ch.offset = operand_pos.saturating_sub(back);
        ch.l_default = ch.l_backup;
        ch.lplus_default = ch.lplus_backup;
        ch.octave = ch.nest_octave_backup;
    } else {
        ch.flags.nest_depth -= 1;
    }
}

/// Decode one note object and start it sounding (or resting).
fn process_note(
    shared: &mut Shared,
    ch: &mut Channel,
    options: &DriverOptions,
    sink: &mut dyn DriverSink,
    code: u8,
) -> Option<()> {
    let note = code & 0x0F;
    let tie = code & 0x40 != 0;
    let len = match (code >> 4) & 0x03 {
        0x0 => ch.l_default as u16,
        0x1 => ch.lplus_default as u16,
        0x2 => ch.read()? as u16,
        _ => {
            let lo = ch.read()?;
            let hi = ch.read()?;
            u16::from_le_bytes([lo, hi])
        }
    };

    ch.wait_counter = len;
    let mut q = if tie { 0 } else { ch.q_default };
    if len > 0 && q as u16 >= len {
        // Guarantee at least one sounding tick.
        q = (len - 1) as u8;
    }
    ch.q_counter = q;

    if note == 0 {
        ch.flags.rest = true;
        sink.write_reg(AVOL + ch.channel_index, 0);
        sink.note_event(&NoteEvent {
            channel: ch.channel_index,
            octave: ch.octave,
            note: 0,
            volume: ch.volume,
            len,
            is_rest: true,
            bpm_x10: shared.tempo.bpm_x10(),
        });
    } else {
        ch.flags.rest = false;
        let prev_tie = ch.flags.tie;

        if !prev_tie && ch.eg_width_base != 0 {
            ch.flags.eg_stage2 = false;
            ch.eg_count_work = ch.eg_count_base;
            ch.eg_width_work = 0;
        }
        if ch.flags.vib_on && !(options.keep_vibrato_tie && prev_tie) {
            ch.lfo_init();
        }

        let period = apply_detune(tone_period(ch.octave, note), ch.detune);
        ch.freq_value = period;

        if !prev_tie {
            // Mute before retuning so the old tone can't click through.
            sink.write_reg(AVOL + ch.channel_index, 0);
        }
        write_tone(sink, ch.channel_index, period as i32);

        let volume = if prev_tie {
            clamped_volume(ch.volume, ch.volume_adjust)
        } else {
            ch.volume
        };
        sink.write_reg(AVOL + ch.channel_index, volume);

        sink.note_event(&NoteEvent {
            channel: ch.channel_index,
            octave: ch.octave,
            note,
            volume,
            len,
            is_rest: false,
            bpm_x10: shared.tempo.bpm_x10(),
        });
    }

    ch.flags.tie = tie;
    Some(())
}

/// Emit the 12-bit tone period pair for a channel, clamped to `[1, 0xFFF]`.
fn write_tone(sink: &mut dyn DriverSink, channel: u8, period: i32) {
    let period = clamp_emitted_period(period);
    sink.write_reg(AFINE + channel * 2, (period & 0xFF) as u8);
    sink.write_reg(ACOARSE + channel * 2, ((period >> 8) & 0x0F) as u8);
}

/// Emit an envelope-adjusted amplitude, clamped to the 4-bit range.
fn write_volume(sink: &mut dyn DriverSink, channel: u8, volume: u8, adjust: i8) {
    sink.write_reg(AVOL + channel, clamped_volume(volume, adjust));
}

fn clamped_volume(volume: u8, adjust: i8) -> u8 {
    (volume as i16 + adjust as i16).clamp(0, 15) as u8
}
