//! The standard WMO table B: element descriptor metadata.

use bufr_core::{Code, VarInfo};
use bufr_encoding::{Error, Vartable};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One raw table B row, as laid out in the WMO master table.
struct Entry {
    code: Code,
    desc: &'static str,
    unit: &'static str,
    scale: i32,
    bit_ref: i64,
    bit_len: u32,
    is_string: bool,
}

macro_rules! entry {
    ($f:expr, $x:expr, $y:expr, $desc:expr, $unit:expr, $scale:expr, $bit_ref:expr, $bit_len:expr, $is_string:expr) => {
        Entry {
            code: Code::new($f, $x, $y),
            desc: $desc,
            unit: $unit,
            scale: $scale,
            bit_ref: $bit_ref,
            bit_len: $bit_len,
            is_string: $is_string,
        }
    };
}

/// A representative slice of the WMO BUFR master table B: enough entries to
/// cover synop-style identification, replication factors, the data present
/// bitmap, and a quality attribute.
static ENTRIES: &[Entry] = &[
    entry!(0, 1, 1, "WMO BLOCK NUMBER", "NUMERIC", 0, 0, 7, false),
    entry!(0, 1, 2, "WMO STATION NUMBER", "NUMERIC", 0, 0, 10, false),
    entry!(0, 1, 194, "STATION OR SITE NAME", "CCITT IA5", 0, 0, 160, true),
    entry!(0, 5, 1, "LATITUDE (HIGH ACCURACY)", "DEGREE", 5, -9_000_000, 25, false),
    entry!(0, 6, 1, "LONGITUDE (HIGH ACCURACY)", "DEGREE", 5, -18_000_000, 26, false),
    entry!(0, 7, 1, "HEIGHT OF STATION", "M", 0, -400, 15, false),
    entry!(0, 12, 1, "TEMPERATURE/DRY-BULB TEMPERATURE", "K", 1, -4096, 13, false),
    entry!(0, 31, 1, "DELAYED DESCRIPTOR REPLICATION FACTOR", "NUMERIC", 0, 0, 8, false),
    entry!(0, 31, 2, "EXTENDED DELAYED DESCRIPTOR REPLICATION FACTOR", "NUMERIC", 0, 0, 16, false),
    entry!(0, 31, 31, "DATA PRESENT INDICATOR", "CCITT IA5", 0, 0, 1, false),
    entry!(0, 33, 7, "PER CENT CONFIDENCE", "%", 0, 0, 7, false),
];

/// An altered `VarInfo` cache key, keyed by the base descriptor and the
/// scale/width override applied to it.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct AlteredKey {
    code: Code,
    new_scale: i32,
    new_bit_len: u32,
}

static BY_CODE: Lazy<HashMap<Code, Arc<VarInfo>>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|e| {
            (
                e.code,
                Arc::new(VarInfo::new(
                    e.code, e.desc, e.unit, e.unit, e.scale, e.scale, e.bit_ref, e.bit_len,
                    e.is_string,
                )),
            )
        })
        .collect()
});

static ALTERED_CACHE: Lazy<Mutex<HashMap<AlteredKey, Arc<VarInfo>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The WMO standard table B, queried from an in-memory registry built once
/// on first use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StandardVartable;

impl Vartable for StandardVartable {
    fn query(&self, code: Code) -> bufr_encoding::Result<Arc<VarInfo>> {
        BY_CODE
            .get(&code)
            .cloned()
            .ok_or_else(|| unknown_descriptor(code))
    }

    fn query_altered(
        &self,
        code: Code,
        new_scale: i32,
        new_bit_len: u32,
    ) -> bufr_encoding::Result<Arc<VarInfo>> {
        let base = self.query(code)?;
        let key = AlteredKey {
            code,
            new_scale,
            new_bit_len,
        };
        let mut cache = ALTERED_CACHE.lock().expect("altered table cache poisoned");
        if let Some(cached) = cache.get(&key) {
            return Ok(Arc::clone(cached));
        }
        let altered = Arc::new(base.altered(new_scale, new_bit_len));
        cache.insert(key, Arc::clone(&altered));
        Ok(altered)
    }

    fn contains(&self, code: Code) -> bool {
        BY_CODE.contains_key(&code)
    }
}

fn unknown_descriptor(code: Code) -> Error {
    Error::InvariantViolation {
        message: format!("unknown table B descriptor {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_wmo_block_number() {
        let table = StandardVartable;
        let info = table.query(Code::new(0, 1, 1)).unwrap();
        assert_eq!(info.desc, "WMO BLOCK NUMBER");
        assert_eq!(info.bit_len, 7);
    }

    #[test]
    fn altered_variant_is_cached_by_key() {
        let table = StandardVartable;
        let a = table.query_altered(Code::new(0, 12, 1), 1, 14).unwrap();
        let b = table.query_altered(Code::new(0, 12, 1), 1, 14).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.bit_len, 14);
    }

    #[test]
    fn unknown_descriptor_is_an_error() {
        let table = StandardVartable;
        assert!(!table.contains(Code::new(0, 63, 255)));
        assert!(table.query(Code::new(0, 63, 255)).is_err());
    }
}
