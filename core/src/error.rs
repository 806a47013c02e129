//! Core error types shared by every layer of the crate.
//!
//! Each layer (this crate, the bit codec, the DDS interpreter) defines its
//! own `#[derive(Snafu)]` error enum for the failures it can directly cause,
//! and wraps the lower layer's error as a `source`. This module additionally
//! carries [`DecodePath`], the positional context (section, byte offset, bit
//! offset, descriptor stack) that gets attached to an error as it propagates
//! up to the caller, per the diagnostic policy in the specification.

use crate::descriptor::Code;
use snafu::Snafu;
use std::fmt;

/// Type alias for a result using this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised directly by the core data model (value ranges, descriptor
/// consistency checks, invariant guards). Positional context is attached by
/// the caller via [`DecodePath`] when these are re-raised at a higher layer.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A numeric value does not fit in the effective bit width, or is
    /// negative after reference-value subtraction.
    #[snafu(display(
        "value {value} out of range for a {bit_len}-bit field with reference {bit_ref} ({path})"
    ))]
    ValueOutOfRange {
        /// The value that failed to fit.
        value: i64,
        /// The effective field width, in bits.
        bit_len: u32,
        /// The field's integer reference.
        bit_ref: i64,
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// The encoder found a subset variable whose descriptor code differs
    /// from the one the DDS interpreter expected next.
    #[snafu(display("expected descriptor {expected} but subset holds {got} ({path})"))]
    DescriptorMismatch {
        /// The descriptor the interpreter expected.
        expected: Code,
        /// The descriptor actually present in the subset.
        got: Code,
        /// Where in the message this happened.
        path: DecodePath,
    },

    /// Section 0's edition byte was not 2, 3, or 4.
    #[snafu(display("unexpected BUFR edition {edition}"))]
    UnexpectedEdition {
        /// The edition byte that was read.
        edition: u8,
    },

    /// A consistency check inside the interpreter failed; this indicates a
    /// bug rather than malformed input.
    #[snafu(display("internal invariant violated: {message} ({path})"))]
    InvariantViolation {
        /// A description of which invariant failed.
        message: String,
        /// Where in the message this happened.
        path: DecodePath,
    },
}

/// Positional context attached to an error: which section, how many bytes
/// and bits had been consumed, and the stack of descriptors (as a path from
/// the top-level stream down to the one being processed) active when the
/// error was raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodePath {
    /// The BUFR section number (0-5) being processed.
    pub section: u8,
    /// Byte offset from the start of the section.
    pub byte_offset: u64,
    /// Bit offset within the current byte (0..8).
    pub bit_offset: u8,
    /// Stack of descriptors, outermost first, leading to the failure.
    pub descriptor_path: Vec<Code>,
}

impl DecodePath {
    /// Start a path at the given section, with no descriptors consumed yet.
    pub fn at_section(section: u8) -> Self {
        DecodePath {
            section,
            ..Default::default()
        }
    }

    /// Return a copy of this path with one more descriptor pushed onto the
    /// stack -- used when recursing into a sequence or replication group.
    pub fn push(&self, code: Code) -> Self {
        let mut path = self.clone();
        path.descriptor_path.push(code);
        path
    }
}

impl fmt::Display for DecodePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "section {}, byte {} bit {}",
            self.section, self.byte_offset, self.bit_offset
        )?;
        if !self.descriptor_path.is_empty() {
            write!(f, ", at ")?;
            for (i, code) in self.descriptor_path.iter().enumerate() {
                if i > 0 {
                    write!(f, " > ")?;
                }
                write!(f, "[{code}]")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_push_does_not_mutate_original() {
        let base = DecodePath::at_section(4);
        let deeper = base.push(Code::new(3, 1, 1));
        assert!(base.descriptor_path.is_empty());
        assert_eq!(deeper.descriptor_path, vec![Code::new(3, 1, 1)]);
    }

    #[test]
    fn display_includes_path() {
        let path = DecodePath::at_section(4).push(Code::new(1, 1, 0));
        let text = format!("{path}");
        assert!(text.contains("section 4"));
        assert!(text.contains("1 01 000"));
    }
}
