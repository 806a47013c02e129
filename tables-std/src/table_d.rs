//! The standard WMO table D: sequence descriptor expansions.

use bufr_core::{Code, Opcodes};
use bufr_encoding::{Dtable, Error};
use once_cell::sync::Lazy;
use std::collections::HashMap;

static ENTRIES: Lazy<HashMap<Code, Vec<Code>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        Code::new(3, 1, 1),
        vec![Code::new(0, 1, 1), Code::new(0, 1, 2)],
    );
    m.insert(
        Code::new(3, 1, 21),
        vec![Code::new(0, 5, 1), Code::new(0, 6, 1)],
    );
    m
});

/// The WMO standard table D, expanding a sequence descriptor into its
/// member descriptors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StandardDtable;

impl Dtable for StandardDtable {
    fn query(&self, code: Code) -> bufr_encoding::Result<Opcodes<'static>> {
        ENTRIES
            .get(&code)
            .map(|v| Opcodes::owned(v.clone()))
            .ok_or_else(|| Error::InvariantViolation {
                message: format!("unknown table D sequence {code}"),
            })
    }
}
