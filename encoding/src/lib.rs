#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! The bit-level codec and table/unit collaborator contracts used to read
//! and write BUFR field values.
//!
//! This crate has no knowledge of the descriptor stream walk or message
//! framing -- that lives in the parser crate, which builds on the
//! primitives defined here.

pub mod bitcodec;
pub mod error;
pub mod tables;
pub mod units;

pub use bitcodec::{read_uint_be, BitReader, BitWriter};
pub use error::{Error, Result};
pub use tables::{Dtable, Vartable};
pub use units::{IdentityConverter, UnitConverter};
