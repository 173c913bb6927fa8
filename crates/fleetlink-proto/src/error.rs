//! # Codec errors

/// Errors raised while decoding or encoding a MAVLink frame.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// First byte was neither `0xFE` (v1) nor `0xFD` (v2); caller should resync.
    #[error("bad magic byte: {0:#04x}")]
    BadMagic(u8),

    /// Not enough bytes buffered yet to decode a full frame.
    #[error("incomplete frame, need {needed} more byte(s)")]
    Incomplete {
        /// Additional bytes required before a decode can be retried.
        needed: usize,
    },

    /// On-wire CRC did not match the computed CRC.
    #[error("CRC mismatch: wire={wire:#06x} computed={computed:#06x}")]
    CrcMismatch {
        /// CRC as read from the frame.
        wire: u16,
        /// CRC recomputed over the frame body plus CRC_EXTRA.
        computed: u16,
    },

    /// Payload longer than the message's nominal (zero-padded) length.
    #[error("payload for message {msg_id} exceeds nominal length {nominal} (got {got})")]
    PayloadTooLong {
        /// Message id whose nominal length was exceeded.
        msg_id: u32,
        /// Nominal (untruncated) payload length for this message id.
        nominal: usize,
        /// Actual payload length supplied to encode.
        got: usize,
    },
}

/// Result alias used throughout this crate.
pub type Result<T> = core::result::Result<T, CodecError>;
