use std::io;
use thiserror::Error;

/// Faults raised by the byte-stuffing codec.
///
/// Each class carries the numeric code used in LOG diagnostics so a host can
/// tell them apart on the wire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CobsError {
    #[error("buffer overflow (more than 254 content bytes)")]
    Overflow,

    #[error("unexpected zero byte in the middle of a run")]
    UnexpectedZero,

    #[error("run counter reached zero without a marker")]
    MissingMarker,
}

impl CobsError {
    /// Numeric code reported in diagnostics (`COBS Decode Error <code>`).
    pub fn code(&self) -> i8 {
        match self {
            CobsError::Overflow => -1,
            CobsError::UnexpectedZero => -2,
            CobsError::MissingMarker => -3,
        }
    }
}

/// The primary error type for the `fcmp-lib` library.
#[derive(Error, Debug)]
pub enum FcmpError {
    #[error("COBS error: {0}")]
    Cobs(#[from] CobsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Field too large: {size} bytes (max {max})")]
    FieldTooLarge { size: usize, max: usize },

    #[error("Runt frame: {0} bytes, need at least checksum and header")]
    Runt(usize),

    #[error("Checksum mismatch: residue 0x{0:02X}")]
    Checksum(u8),

    #[error("Invalid field size for {field}: expected {expected} bytes, got {actual}")]
    FieldSize {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Hardware error: {0}")]
    Hardware(String),
}

impl FcmpError {
    /// Creates a new hardware error
    pub fn hardware(msg: impl Into<String>) -> Self {
        FcmpError::Hardware(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cobs_error_codes_are_distinct() {
        let codes = [
            CobsError::Overflow.code(),
            CobsError::UnexpectedZero.code(),
            CobsError::MissingMarker.code(),
        ];
        assert_eq!(codes, [-1, -2, -3]);
    }

    #[test]
    fn test_error_conversion() {
        let err: FcmpError = CobsError::UnexpectedZero.into();
        assert!(matches!(err, FcmpError::Cobs(CobsError::UnexpectedZero)));

        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: FcmpError = io_err.into();
        assert!(matches!(err, FcmpError::Io(_)));
    }
}
