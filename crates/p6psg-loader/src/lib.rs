//! Loader for PC-6001 PSG song data files.
//!
//! A song file is an 8-byte header followed by three bytecode streams, one
//! per voice. The header starts with three little-endian 16-bit file
//! offsets `(a, b, c)` satisfying `8 <= a < b < c <= filesize`; each
//! stream runs to the start of the next (channel C to the end of the file)
//! and must finish with the `0xFF` end mark.
//!
//! The loader owns the file bytes once; channels are handed out as
//! `Arc<[u8]>` so the driver holds cheap clones for as long as it plays.

#![warn(missing_docs)]

mod error;

pub use error::{LoaderError, Result};

use std::path::Path;
use std::sync::Arc;

/// Number of voice streams in a song file.
pub const CHANNEL_COUNT: usize = 3;

/// Size of the address header at the start of a song file.
const HEADER_SIZE: usize = 8;

/// Stream terminator; every channel slice must end with it.
const END_MARK: u8 = 0xFF;

/// A loaded song: one bytecode stream per voice.
#[derive(Debug, Clone)]
pub struct Song {
    channels: [Arc<[u8]>; CHANNEL_COUNT],
}

impl Song {
    /// Build a song from three raw streams, validating the end marks.
    ///
    /// This is the path used for built-in data; file loading goes through
    /// [`load_bytes`].
    pub fn from_channels(channels: [&[u8]; CHANNEL_COUNT]) -> Result<Self> {
        for (index, data) in channels.iter().enumerate() {
            if data.last() != Some(&END_MARK) {
                return Err(LoaderError::MissingEndMark { channel: index });
            }
        }
        Ok(Self {
            channels: channels.map(Arc::from),
        })
    }

    /// Shared handle to one channel's stream. Panics outside 0..=2.
    pub fn channel(&self, index: usize) -> Arc<[u8]> {
        Arc::clone(&self.channels[index])
    }

    /// Length in bytes of one channel's stream.
    pub fn channel_len(&self, index: usize) -> usize {
        self.channels[index].len()
    }
}

/// Parse a song from an in-memory byte buffer.
pub fn load_bytes(data: &[u8]) -> Result<Song> {
    if data.len() < HEADER_SIZE + CHANNEL_COUNT {
        return Err(LoaderError::TooShort { size: data.len() });
    }
    if data.len() > u16::MAX as usize {
        return Err(LoaderError::TooLarge { size: data.len() });
    }

    let a = u16::from_le_bytes([data[0], data[1]]);
    let b = u16::from_le_bytes([data[2], data[3]]);
    let c = u16::from_le_bytes([data[4], data[5]]);

    let size = data.len();
    if (a as usize) < HEADER_SIZE || a >= b || b >= c || c as usize > size {
        return Err(LoaderError::InvalidLayout { a, b, c, size });
    }

    let bounds = [
        (a as usize, b as usize),
        (b as usize, c as usize),
        (c as usize, size),
    ];
    for (index, &(start, end)) in bounds.iter().enumerate() {
        if end == start || data[end - 1] != END_MARK {
            return Err(LoaderError::MissingEndMark { channel: index });
        }
    }

    Ok(Song {
        channels: bounds.map(|(start, end)| Arc::from(&data[start..end])),
    })
}

/// Read and parse a song file from disk.
pub fn load_file(path: impl AsRef<Path>) -> Result<Song> {
    let data = std::fs::read(path)?;
    load_bytes(&data)
}
