//! Built-in demo song: a C major chord arpeggiated across the three
//! voices, three half notes per voice.

use p6psg_loader::{Result, Song};

const CHANNEL_A: &[u8] = &[
    0x85, // o5
    0x9F, // v15
    0x21, 96, // C
    0x84, // o4
    0x2C, 96, // B
    0x85, // o5
    0x21, 96, // C
    0xFF,
];

const CHANNEL_B: &[u8] = &[
    0x85, // o5
    0x9F, // v15
    0x25, 96, // E
    0x23, 96, // D
    0x25, 96, // E
    0xFF,
];

const CHANNEL_C: &[u8] = &[
    0x85, // o5
    0x9F, // v15
    0x28, 96, // G
    0x28, 96, // G
    0x28, 96, // G
    0xFF,
];

/// The demo song played when no file is given.
pub fn demo_song() -> Result<Song> {
    Song::from_channels([CHANNEL_A, CHANNEL_B, CHANNEL_C])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_song_is_well_formed() {
        let song = demo_song().unwrap();
        for ch in 0..3 {
            assert_eq!(song.channel(ch).last(), Some(&0xFF));
        }
    }
}
