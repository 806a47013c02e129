//! The outer bulletin frame: identification fields, the top-level
//! descriptor list, and the subsets that share it.

use crate::descriptor::Code;
use crate::var::Subset;
use std::fmt;

/// The BUFR edition, carried in section 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Edition {
    /// Edition 2.
    Edition2,
    /// Edition 3 (18-byte section 1).
    Edition3,
    /// Edition 4 (22-byte section 1, 16-bit centre/subcentre/year).
    Edition4,
}

impl Edition {
    /// Convert from the section 0 edition byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            2 => Some(Edition::Edition2),
            3 => Some(Edition::Edition3),
            4 => Some(Edition::Edition4),
            _ => None,
        }
    }

    /// The section 0 edition byte for this edition.
    pub fn as_byte(self) -> u8 {
        match self {
            Edition::Edition2 => 2,
            Edition::Edition3 => 3,
            Edition::Edition4 => 4,
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "edition {}", self.as_byte())
    }
}

/// Section 1 identification fields common to every supported edition.
///
/// Fields that only exist in edition 4 (`subtype`, `second`) are present
/// here too and simply ignored (read as 0, written as 0) when encoding
/// edition 2 or 3.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identification {
    /// BUFR master table number.
    pub master_table: u8,
    /// Originating/generating centre.
    pub centre: u16,
    /// Originating/generating sub-centre.
    pub subcentre: u16,
    /// Update sequence number (0 for the original message).
    pub update_sequence_number: u8,
    /// Data category (table A).
    pub data_type: u8,
    /// International data sub-category (edition 4 only; 0 otherwise).
    pub subtype: u8,
    /// Local data sub-category.
    pub local_subtype: u8,
    /// Version number of master table used.
    pub master_table_version: u8,
    /// Version number of local table used.
    pub local_table_version: u8,
    /// Year of century / full year (full year for edition 4).
    pub year: u16,
    /// Month, 1-12.
    pub month: u8,
    /// Day, 1-31.
    pub day: u8,
    /// Hour, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Second, 0-59 (edition 4 only; 0 otherwise).
    pub second: u8,
}

/// A parsed (or to-be-encoded) BUFR message.
#[derive(Debug, Clone, PartialEq)]
pub struct Bulletin {
    /// The message's edition.
    pub edition: Edition,
    /// Section 1 identification fields.
    pub ident: Identification,
    /// Optional section 2 payload, if present.
    pub optional_section: Option<Vec<u8>>,
    /// The top-level descriptor list (section 3), before expansion.
    pub datadesc: Vec<Code>,
    /// Whether section 4 uses column-wise compression.
    pub compression: bool,
    /// Whether the "observed data" flag (section 3 bit 7) is set.
    pub observed: bool,
    /// The decoded subsets, one per data row, all sharing `datadesc`.
    pub subsets: Vec<Subset>,
}

impl Bulletin {
    /// The number of subsets (data rows) in this message.
    pub fn num_subsets(&self) -> usize {
        self.subsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edition_roundtrips_through_byte() {
        for e in [Edition::Edition2, Edition::Edition3, Edition::Edition4] {
            assert_eq!(Edition::from_byte(e.as_byte()), Some(e));
        }
        assert_eq!(Edition::from_byte(5), None);
    }

    #[test]
    fn bulletin_reports_subset_count() {
        let b = Bulletin {
            edition: Edition::Edition4,
            ident: Identification::default(),
            optional_section: None,
            datadesc: vec![Code::new(0, 1, 1)],
            compression: false,
            observed: true,
            subsets: vec![Vec::new(), Vec::new()],
        };
        assert_eq!(b.num_subsets(), 2);
    }
}
