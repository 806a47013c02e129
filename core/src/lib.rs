#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Core data types for BUFR (Binary Universal Form for the Representation
//! of meteorological data) content: data descriptors, the variable
//! information model, and the outer bulletin frame.
//!
//! This crate carries no I/O and no table lookup logic of its own -- it is
//! the vocabulary that the encoding and parser crates build on.

pub mod bulletin;
pub mod descriptor;
pub mod error;
pub mod value;
pub mod var;
pub mod varinfo;

pub use bulletin::{Bulletin, Edition};
pub use descriptor::{Code, Opcodes, F};
pub use error::{DecodePath, Error, Result};
pub use value::Value;
pub use var::{Subset, Var};
pub use varinfo::VarInfo;
