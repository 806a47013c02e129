//! The parser's error type: the union of every failure this crate can
//! surface, whether raised directly or propagated from a lower layer.

use bufr_core::error::DecodePath;
use bufr_core::Code;
use snafu::Snafu;

/// Type alias for a result using this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised while encoding or decoding a BUFR message.
///
/// `Core` and `Codec` wrap the lower layers' own error types unchanged
/// (they already carry their own positional context where relevant); the
/// remaining variants are raised directly by the DDS interpreter or the
/// section framing code and carry a [`DecodePath`] pinpointing where in the
/// message the failure happened.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A failure from the core data model (value ranges, descriptor
    /// mismatches, unexpected edition, internal invariants).
    #[snafu(context(false))]
    Core {
        /// The underlying error.
        source: bufr_core::Error,
    },

    /// A failure from the bit-level codec (end of buffer, bit overflow,
    /// width too wide).
    #[snafu(context(false))]
    Codec {
        /// The underlying error.
        source: bufr_encoding::Error,
    },

    /// Neither table B nor table D has an entry for this descriptor.
    #[snafu(display("unknown descriptor {code} ({path})"))]
    UnknownDescriptor {
        /// The descriptor that could not be resolved.
        code: Code,
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// A `C 2 X` operator descriptor outside the handled set (§4.3).
    #[snafu(display("unsupported C-modifier {code} ({path})"))]
    UnsupportedCModifier {
        /// The operator descriptor.
        code: Code,
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// A compressed string field's base is not all-zero, or its `diffbits`
    /// exceeds the base length.
    #[snafu(display("compressed string unsupported: {message} ({path})"))]
    CompressedStringUnsupported {
        /// What about the compressed layout was rejected.
        message: String,
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// The bitmap cursor ran past the bitmap or past the subset while
    /// advancing over attribute slots.
    #[snafu(display("bitmap error: {message} ({path})"))]
    BitmapError {
        /// What went wrong advancing the bitmap cursor.
        message: String,
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// A delayed replication descriptor (`Y=0`) was not followed by a
    /// usable replication factor.
    #[snafu(display("missing delayed replication factor ({path})"))]
    MissingDelayedFactor {
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// Section 0 did not begin with the `"BUFR"` magic, or section 5 was
    /// not `"7777"`.
    #[snafu(display("expected magic {expected:?}, found {found:?}"))]
    UnexpectedMagic {
        /// The magic bytes that should have been present.
        expected: &'static [u8],
        /// The bytes actually found.
        found: Vec<u8>,
    },

    /// A section's declared length does not match the number of bytes
    /// actually written or consumed for it.
    #[snafu(display(
        "section {section} length mismatch: header says {declared}, actual {actual}"
    ))]
    SectionLengthMismatch {
        /// The section number.
        section: u8,
        /// The length declared in the section header.
        declared: u32,
        /// The length actually observed.
        actual: u32,
    },
}
