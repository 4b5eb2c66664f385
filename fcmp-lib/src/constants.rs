// Protocol constants for FCMP over COBS

/// Largest payload the byte-stuffing codec accepts (254 bytes)
pub const MAX_CONTENT: usize = 254;

/// Largest encoded frame on the wire: content + run marker + delimiter
pub const MAX_ENCODED: usize = MAX_CONTENT + 2;

/// Frame delimiter on the wire
pub const DELIMITER: u8 = 0x00;

/// Size of the FCMP frame prefix (checksum + header)
pub const FRAME_HEADER_SIZE: usize = 2;

/// Largest field payload that fits in one frame (252 bytes)
pub const MAX_FIELD: usize = MAX_CONTENT - FRAME_HEADER_SIZE;

/// Size of a CFG field (16-bit bitmask)
pub const CFG_FIELD_SIZE: usize = 2;

/// Size of a POS field (four 16-bit channels)
pub const POS_FIELD_SIZE: usize = 8;

/// Size of an LPF field (16-bit frequency in Hz)
pub const LPF_FIELD_SIZE: usize = 2;

/// Low pass filter cutoff loaded at boot, in Hz
pub const DEFAULT_LPF_HZ: u16 = 100;

/// The filter clock runs at this multiple of the cutoff frequency
pub const LPF_CLOCK_RATIO: u32 = 60;

/// Default line rate of the serial link
pub const SERIAL_BAUD: u32 = 115_200;

/// DAC bias written to all channels on enable and before disable
pub const DAC_NEUTRAL_BIAS: u16 = 0x6666;

// Rejection reasons carried in REJ frames
pub const REJ_INVALID_FIELD_SIZE: &str = "Invalid field size";
pub const REJ_INVALID_METHOD: &str = "Invalid method";
pub const REJ_POSITION_PENDING: &str = "Position change already pending";
pub const REJ_UNKNOWN_FIELD: &str = "Unknown field id";

/// One-shot notice sent when the LOG config bit becomes set
pub const LOG_ENABLED_NOTICE: &str = "FCMP log enabled";
