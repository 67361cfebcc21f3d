//! Demuxer error types.
//!
//! Every parse step returns [`Result`]. Which failures abort an operation and
//! which degrade to "section absent" is decided by the caller of each parser,
//! not here.

use thiserror::Error;

/// Matroska demuxing errors.
#[derive(Error, Debug)]
pub enum MkvError {
    /// The source ended in the middle of a value.
    #[error("Unexpected end of data at offset {offset}")]
    UnexpectedEndOfData {
        /// Byte offset at which more data was required.
        offset: u64,
    },

    /// Invalid variable-length integer (zero lead byte or over-long prefix).
    #[error("Malformed variable-length integer at offset {offset}")]
    MalformedVarInt {
        /// Byte offset of the lead byte.
        offset: u64,
    },

    /// Structurally invalid element.
    #[error("Malformed element at offset {offset}: {message}")]
    MalformedElement {
        /// Byte offset of the element (or of the offending field).
        offset: u64,
        /// Description of the defect.
        message: String,
    },

    /// The EBML header does not announce a Matroska or WebM document.
    #[error("Unsupported EBML document type: {0}")]
    UnsupportedDocType(String),

    /// Invalid EBML header.
    #[error("Invalid EBML header: {0}")]
    InvalidEbmlHeader(String),

    /// An element that must be unique was encountered twice.
    #[error("Duplicate {element} at offset {offset}")]
    DuplicateMandatoryElement {
        /// Element name.
        element: &'static str,
        /// Byte offset of the duplicate.
        offset: u64,
    },

    /// Missing required element.
    #[error("Missing required element: {0}")]
    MissingElement(String),

    /// A block references a track number not declared in Tracks.
    #[error("Track {track_number} not found")]
    TrackNotFound {
        /// The track number that was not found.
        track_number: u64,
    },

    /// Invalid lacing structure.
    #[error("Invalid lacing: {0}")]
    InvalidLacing(String),

    /// Inflating compressed track data failed.
    #[error("Decompression failed on track {track}: {message}")]
    DecompressionFailure {
        /// Track index.
        track: usize,
        /// Inflate error description.
        message: String,
    },

    /// ContentCompAlgo this demuxer cannot undo.
    #[error("Unsupported content compression algorithm {0}")]
    UnsupportedCompression(u64),

    /// Recursion limit exceeded.
    #[error("Recursion limit exceeded at depth {depth}")]
    RecursionLimit {
        /// The depth at which recursion was limited.
        depth: u32,
    },

    /// The engine hit a fatal stream error and needs `seek(0)`.
    #[error("Demuxer is in a failed state: {0}")]
    EngineFailed(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error from the byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MkvError {
    /// Shorthand for [`MkvError::MalformedElement`].
    pub(crate) fn malformed(offset: u64, message: impl Into<String>) -> Self {
        MkvError::MalformedElement {
            offset,
            message: message.into(),
        }
    }

    /// Whether the error describes damaged input (as opposed to I/O or
    /// misuse). Damaged input is what the resync loop tries to step over.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            MkvError::UnexpectedEndOfData { .. }
                | MkvError::MalformedVarInt { .. }
                | MkvError::MalformedElement { .. }
                | MkvError::InvalidLacing(_)
                | MkvError::RecursionLimit { .. }
        )
    }
}

impl From<MkvError> for std::io::Error {
    fn from(err: MkvError) -> Self {
        match err {
            MkvError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result type for demuxer operations.
pub type Result<T> = std::result::Result<T, MkvError>;
