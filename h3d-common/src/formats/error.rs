//! Decoding errors for the binary formats

/// Error returned when a geometry or animation file cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported version {found}, expected {expected}")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("unknown stream id {0}")]
    UnknownStream(u32),

    #[error("stream {id} has element size {found}, expected {expected}")]
    StreamElementSize { id: u32, expected: u32, found: u32 },

    #[error("name field is not valid UTF-8")]
    InvalidName,
}
