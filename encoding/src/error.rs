//! Errors raised by the bit-level codec.

use snafu::Snafu;

/// Type alias for a result using this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised while reading or writing bit-packed fields.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The reader ran out of bits before satisfying a request.
    #[snafu(display(
        "end of buffer: needed {needed} more bits, only {available} left"
    ))]
    EndOfBuffer {
        /// Bits requested by the caller.
        needed: u32,
        /// Bits actually remaining in the buffer.
        available: u32,
    },

    /// A value passed to a write operation does not fit in the requested
    /// width.
    #[snafu(display("value {value} does not fit in {bits} bits"))]
    BitOverflow {
        /// The value that overflowed.
        value: u64,
        /// The requested width, in bits.
        bits: u32,
    },

    /// A width wider than 32 bits was requested for an integer operation.
    #[snafu(display("bit width {bits} exceeds the 32-bit limit for integer fields"))]
    WidthTooWide {
        /// The requested width, in bits.
        bits: u32,
    },

    /// A consistency check inside the codec failed.
    #[snafu(display("internal invariant violated: {message}"))]
    InvariantViolation {
        /// A description of which invariant failed.
        message: String,
    },
}
