//! Error handling for song-file loading.

use thiserror::Error;

/// Convenient result alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that may occur while reading or validating a song file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// File smaller than the header plus one end mark per channel.
    #[error("file too short ({size} bytes)")]
    TooShort {
        /// Actual file size.
        size: usize,
    },

    /// Files are addressed with 16-bit offsets; anything bigger cannot be
    /// a valid song.
    #[error("file too large ({size} bytes, limit 65535)")]
    TooLarge {
        /// Actual file size.
        size: usize,
    },

    /// Header addresses violate `8 <= a < b < c <= filesize`.
    #[error(
        "invalid address layout (a={a:#06x}, b={b:#06x}, c={c:#06x}, size={size:#06x})"
    )]
    InvalidLayout {
        /// Channel A start address.
        a: u16,
        /// Channel B start address.
        b: u16,
        /// Channel C start address.
        c: u16,
        /// File size.
        size: usize,
    },

    /// A channel slice does not end with the `0xFF` end mark.
    #[error("channel {channel} data has no end mark")]
    MissingEndMark {
        /// Channel index 0..=2.
        channel: usize,
    },

    /// IO error from the filesystem.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
