//! Per-variable metadata, as produced by the table B lookup service.

use crate::descriptor::Code;
use std::fmt;

/// Immutable metadata for one data descriptor, as returned by a table B
/// lookup.
///
/// `VarInfo` is produced once by the table service and then shared by
/// reference for the rest of the program's lifetime -- it is never mutated.
/// "Altered" variants (produced when a `C 01`/`C 02` modifier changes the
/// effective bit length or scale) are distinct `VarInfo` values, built with
/// [`VarInfo::altered`] and owned by the table service's cache; they are not
/// produced by mutating an existing value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    /// The descriptor this metadata describes.
    pub code: Code,
    /// Human-readable description, e.g. "WMO BLOCK NUMBER".
    pub desc: String,
    /// The unit as named by the table (may differ from `bufr_unit`, e.g.
    /// "Degree true" vs. a table's canonical "deg").
    pub unit: String,
    /// The canonical BUFR unit used for bit-packing.
    pub bufr_unit: String,
    /// Decimal scale used when presenting the value to callers.
    pub scale: i32,
    /// BUFR scale: decimal places applied when integerizing for encoding.
    pub bufr_scale: i32,
    /// Integer reference value subtracted before encoding (and added back
    /// after decoding).
    pub bit_ref: i64,
    /// Width of the field, in bits.
    pub bit_len: u32,
    /// Whether the field is a character string (`CCITT IA5`) rather than
    /// numeric.
    pub is_string: bool,
}

impl VarInfo {
    /// Create a new, un-altered `VarInfo`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: Code,
        desc: impl Into<String>,
        unit: impl Into<String>,
        bufr_unit: impl Into<String>,
        scale: i32,
        bufr_scale: i32,
        bit_ref: i64,
        bit_len: u32,
        is_string: bool,
    ) -> Self {
        VarInfo {
            code,
            desc: desc.into(),
            unit: unit.into(),
            bufr_unit: bufr_unit.into(),
            scale,
            bufr_scale,
            bit_ref,
            bit_len,
            is_string,
        }
    }

    /// Character length of a string field (`bit_len / 8`). Meaningless for
    /// numeric fields.
    pub fn len(&self) -> u32 {
        self.bit_len / 8
    }

    /// Whether this field has zero width (a string `len()` of zero, or a
    /// numeric field with `bit_len == 0`).
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Produce an altered `VarInfo`: same descriptor and units, but with the
    /// given scale and bit length overrides applied (as `C 01`/`C 02`
    /// modifiers do). Table services cache the result keyed by
    /// `(code, new_scale, new_bit_len)` so repeated queries return the same
    /// logical metadata.
    pub fn altered(&self, new_scale: i32, new_bit_len: u32) -> VarInfo {
        VarInfo {
            bufr_scale: new_scale,
            bit_len: new_bit_len,
            ..self.clone()
        }
    }
}

impl fmt::Display for VarInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.code, self.desc, self.bufr_unit)
    }
}
