use std::{
    error::Error,
    fmt::Display,
    io::{self},
};

/// Errors that may occur when reading a command or reply from a stream.
#[derive(Debug)]
pub enum ReadError {
    IoError(io::Error),
    /// The device announced something other than the mode identifier
    InvalidIdentifier(String),
    InvalidFormat(String),
    /// A reply arrived that does not answer the command that was sent
    UnexpectedReply { expected: u8, got: u8 },
    /// The first byte of a reply does not start any known reply
    UnknownReply(u8),
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        ReadError::IoError(value)
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::IoError(error) => write!(f, "{}", error),
            ReadError::InvalidIdentifier(identifier) => {
                write!(f, "Device announced unexpected identifier {}", identifier)
            }
            ReadError::InvalidFormat(format) => write!(f, "{}", format),
            ReadError::UnexpectedReply { expected, got } => write!(
                f,
                "Expected reply to command 0x{:02x}, but got 0x{:02x}",
                expected, got
            ),
            ReadError::UnknownReply(code) => write!(f, "Received unknown reply 0x{:02x}", code),
        }
    }
}

impl Error for ReadError {}
