#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! The standard WMO BUFR master tables B and D.
//!
//! ## Run-time tables
//!
//! - [`table_b::StandardVartable`]: table B, element descriptor metadata.
//!   Queried through the [`bufr_encoding::Vartable`] trait.
//! - [`table_d::StandardDtable`]: table D, sequence descriptor expansions,
//!   queried through [`bufr_encoding::Dtable`].
//!
//! Both are backed by an in-memory registry built once on first use and
//! kept for the life of the process; altered table B entries (produced by
//! `C 01`/`C 02` modifiers) are cached the same way.
pub mod table_b;
pub mod table_d;

pub use table_b::StandardVartable;
pub use table_d::StandardDtable;
