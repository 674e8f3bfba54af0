//! Errors produced while decoding a Standard MIDI File.
//!
//! Only header corruption, I/O failures and files without a single playable
//! note are returned from the load functions. Track-level problems
//! (`InvalidTrackHeader`, `Truncated`, `OutOfBounds`, `UnexpectedDataByte`)
//! are recovered inside the decoder: the offending track is skipped or cut
//! short and the error is logged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    /// The file could not be read.
    #[error("Failed to read MIDI file: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed `MThd` chunk.
    ///
    /// ```
    /// # use waterfall_core::DecodeError;
    /// let err = DecodeError::InvalidHeader("missing MThd tag".to_string());
    /// assert_eq!(err.to_string(), "Invalid MIDI header: missing MThd tag");
    /// ```
    #[error("Invalid MIDI header: {0}")]
    InvalidHeader(String),

    /// A chunk where a track was expected does not carry the `MTrk` tag.
    #[error("Invalid track header at byte {offset}: found {found:?}")]
    InvalidTrackHeader { offset: usize, found: String },

    /// A variable-length quantity ran off the end of the readable region or
    /// did not terminate within 4 bytes.
    #[error("Truncated variable-length quantity at byte {offset}")]
    Truncated { offset: usize },

    /// A fixed-width read would go past the readable region.
    #[error("Read of {width} bytes at byte {offset} exceeds length {len}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A data byte appeared where a status byte was required and there was no
    /// running status to reuse.
    #[error("Data byte without running status at byte {offset}")]
    UnexpectedDataByte { offset: usize },

    /// The file is structurally valid but contains no notes.
    #[error("No playable notes found in MIDI file")]
    EmptyResult,
}

pub type Result<T> = std::result::Result<T, DecodeError>;
