//! Collaborator traits for table-driven metadata lookup.
//!
//! This crate defines the contracts; concrete table data (the WMO standard
//! B/D tables) lives in a separate crate so that the codec stays usable
//! with alternative or local tables.

use bufr_core::{Code, Opcodes, VarInfo};
use std::sync::Arc;

use crate::error::Result;

/// Table B: maps an element descriptor to its metadata.
///
/// Implementations intern [`VarInfo`] values behind [`Arc`] and cache
/// altered variants produced by [`Vartable::query_altered`] keyed by
/// `(code, new_scale, new_bit_len)`, so repeated lookups for the same
/// alteration return the same allocation.
pub trait Vartable {
    /// Look up an element descriptor's metadata.
    fn query(&self, code: Code) -> Result<Arc<VarInfo>>;

    /// Look up an element descriptor's metadata with a C-modifier scale
    /// and/or bit width override already applied.
    fn query_altered(&self, code: Code, new_scale: i32, new_bit_len: u32) -> Result<Arc<VarInfo>>;

    /// Whether this table has an entry for `code`.
    fn contains(&self, code: Code) -> bool;
}

/// Table D: expands a sequence descriptor into its member descriptors.
pub trait Dtable {
    /// Expand `code` into the descriptor sequence it stands for.
    fn query(&self, code: Code) -> Result<Opcodes<'static>>;
}
