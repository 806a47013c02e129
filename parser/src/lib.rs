#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! A BUFR message parser: the DDS interpreter, the uncompressed and
//! compressed field codecs, and the section 0-5 bulletin framing, wired
//! together behind [`encode_bufr`] and [`decode_bufr`].
//!
//! Table and unit lookups are not built into this crate -- callers supply a
//! [`Vartable`], [`Dtable`] and [`UnitConverter`] (`bufr-tables-std` provides
//! the standard WMO implementations of the first two).

pub mod compressed;
pub mod error;
pub mod framing;
pub mod interpreter;
pub mod uncompressed;

use bufr_core::error::DecodePath;
use bufr_core::{Bulletin, Opcodes};
use bufr_encoding::{BitReader, BitWriter, Dtable, UnitConverter, Vartable};

use crate::compressed::{CompressedDecodeVisitor, CompressedEncodeVisitor};
use crate::error::Result;
use crate::interpreter::{BitmapState, CModState, Interpreter};
use crate::uncompressed::{DecodeVisitor, EncodeVisitor};

/// Options controlling [`decode_bufr`].
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Whether decoded numeric values are converted from their BUFR
    /// canonical unit to the table's reporting unit (e.g. Kelvin to Celsius).
    pub convert_units: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions { convert_units: true }
    }
}

/// Options controlling [`encode_bufr`].
///
/// Empty for now; present so callers have a stable place to add encode-time
/// knobs without changing `encode_bufr`'s signature.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {}

/// Decode a complete BUFR message.
#[tracing::instrument(level = "debug", skip_all)]
pub fn decode_bufr(
    data: &[u8],
    vartable: &dyn Vartable,
    dtable: &dyn Dtable,
    units: &dyn UnitConverter,
    options: &DecodeOptions,
) -> Result<Bulletin> {
    framing::check_section5(data)?;
    framing::check_total_length(data)?;
    let frame = framing::read_frame(data)?;
    let mut bulletin = framing::frame_to_bulletin(&frame);

    let section4_payload_len = (frame.section4_len as usize).saturating_sub(4);
    let section4_end = frame.section4_data_start + section4_payload_len;
    let section4 = &data[frame.section4_data_start..section4_end];

    let opcodes = Opcodes::new(&frame.datadesc);
    let path = DecodePath::at_section(4);
    let n_subsets = frame.num_subsets as usize;

    bulletin.subsets = if frame.compression {
        let mut reader = BitReader::new(section4);
        let visitor = CompressedDecodeVisitor::new(&mut reader, units, options.convert_units, n_subsets);
        let mut interp = Interpreter::new(vartable, dtable, visitor);
        interp.walk(opcodes, &path)?;
        interp.visitor.subsets
    } else {
        let mut reader = BitReader::new(section4);
        let mut subsets = Vec::with_capacity(n_subsets);
        let mut cmod = CModState::default();
        let mut bitmap = BitmapState::empty();
        for _ in 0..n_subsets {
            let visitor = DecodeVisitor::new(&mut reader, units, options.convert_units);
            let mut interp = Interpreter::new(vartable, dtable, visitor);
            interp.cmod = cmod.clone();
            interp.bitmap = bitmap.clone();
            interp.walk(opcodes.clone(), &path)?;
            cmod = interp.cmod.clone();
            bitmap = interp.bitmap.clone();
            subsets.push(interp.visitor.subset);
        }
        subsets
    };

    Ok(bulletin)
}

/// Encode a complete BUFR message.
#[tracing::instrument(level = "debug", skip_all)]
pub fn encode_bufr(
    bulletin: &Bulletin,
    vartable: &dyn Vartable,
    dtable: &dyn Dtable,
    units: &dyn UnitConverter,
    _options: &EncodeOptions,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    framing::write_header(
        &mut out,
        bulletin.edition,
        &bulletin.ident,
        bulletin.optional_section.as_deref(),
        bulletin.num_subsets() as u16,
        bulletin.observed,
        bulletin.compression,
        &bulletin.datadesc,
    );

    let opcodes = Opcodes::new(&bulletin.datadesc);
    let path = DecodePath::at_section(4);
    let mut writer = BitWriter::new();

    if bulletin.compression {
        let visitor = CompressedEncodeVisitor::new(&bulletin.subsets, units, &mut writer);
        let mut interp = Interpreter::new(vartable, dtable, visitor);
        interp.walk(opcodes, &path)?;
    } else {
        let mut cmod = CModState::default();
        let mut bitmap = BitmapState::empty();
        for subset in &bulletin.subsets {
            let visitor = EncodeVisitor::new(subset, units, &mut writer);
            let mut interp = Interpreter::new(vartable, dtable, visitor);
            interp.cmod = cmod.clone();
            interp.bitmap = bitmap.clone();
            interp.walk(opcodes.clone(), &path)?;
            cmod = interp.cmod.clone();
            bitmap = interp.bitmap.clone();
        }
    }

    framing::write_trailer(&mut out, writer);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bufr_core::{Code, Edition, Identification, Value, Var, VarInfo};
    use bufr_encoding::IdentityConverter;
    use bufr_tables_std::{StandardDtable, StandardVartable};
    use std::sync::Arc;

    fn sample_bulletin(temperatures: &[f64]) -> Bulletin {
        let info = Arc::new(VarInfo::new(Code::new(0, 12, 1), "TEMPERATURE", "K", "K", 0, 0, -4096, 13, false));
        let subsets = temperatures
            .iter()
            .map(|&t| vec![Var::new(Arc::clone(&info), Value::Double(t))])
            .collect();
        Bulletin {
            edition: Edition::Edition4,
            ident: sample_ident(),
            optional_section: None,
            datadesc: vec![Code::new(0, 12, 1)],
            compression: false,
            observed: true,
            subsets,
        }
    }

    #[test]
    fn uncompressed_single_subset_round_trips() {
        let bulletin = sample_bulletin(&[293.2]);
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        assert_eq!(decoded.num_subsets(), 1);
        let got = decoded.subsets[0][0].value().as_f64().unwrap();
        assert!((got - 293.2).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn compressed_two_subsets_round_trip() {
        let mut bulletin = sample_bulletin(&[293.2, 294.2]);
        bulletin.compression = true;
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        assert_eq!(decoded.num_subsets(), 2);
        let got0 = decoded.subsets[0][0].value().as_f64().unwrap();
        let got1 = decoded.subsets[1][0].value().as_f64().unwrap();
        assert!((got0 - 293.2).abs() < 1e-9, "got {got0}");
        assert!((got1 - 294.2).abs() < 1e-9, "got {got1}");
    }

    #[test]
    fn missing_value_round_trips() {
        let bulletin = sample_bulletin_with(vec![Value::Missing]);
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        assert!(decoded.subsets[0][0].value().is_missing());
    }

    /// Delayed replication (§8 scenario 4): `0 31 001` gives the count, then
    /// that many `0 01 001` elements follow.
    #[test]
    fn delayed_replication_round_trips() {
        let info_factor = Arc::new(VarInfo::new(Code::new(0, 31, 1), "FACTOR", "NUMERIC", "NUMERIC", 0, 0, 0, 8, false));
        let info_block = Arc::new(VarInfo::new(Code::new(0, 1, 1), "WMO BLOCK NUMBER", "NUMERIC", "NUMERIC", 0, 0, 0, 7, false));
        let subset = vec![
            Var::new(Arc::clone(&info_factor), Value::Int(3)),
            Var::new(Arc::clone(&info_block), Value::Int(10)),
            Var::new(Arc::clone(&info_block), Value::Int(20)),
            Var::new(Arc::clone(&info_block), Value::Int(30)),
        ];
        let bulletin = Bulletin {
            edition: Edition::Edition4,
            ident: sample_ident(),
            optional_section: None,
            datadesc: vec![Code::new(1, 1, 0), Code::new(0, 31, 1), Code::new(0, 1, 1)],
            compression: false,
            observed: true,
            subsets: vec![subset],
        };
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        let subset = &decoded.subsets[0];
        assert_eq!(subset.len(), 4);
        assert_eq!(subset[0].value().as_i64(), Some(3));
        assert_eq!(subset[1].value().as_i64(), Some(10));
        assert_eq!(subset[2].value().as_i64(), Some(20));
        assert_eq!(subset[3].value().as_i64(), Some(30));
    }

    /// C-width change (§8 scenario 5): `2 01 129` widens `0 12 001` by one
    /// bit, allowing a value that would otherwise be `ValueOutOfRange`.
    #[test]
    fn c_width_change_widens_the_field() {
        let info = Arc::new(VarInfo::new(Code::new(0, 12, 1), "TEMPERATURE", "K", "K", 1, 1, -4096, 13, false));
        let subset = vec![Var::new(info, Value::Double(1000.0))];
        let bulletin = Bulletin {
            edition: Edition::Edition4,
            ident: sample_ident(),
            optional_section: None,
            datadesc: vec![Code::new(2, 1, 129), Code::new(0, 12, 1), Code::new(2, 1, 0)],
            compression: false,
            observed: true,
            subsets: vec![subset],
        };
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        let got = decoded.subsets[0][0].value().as_f64().unwrap();
        assert!((got - 1000.0).abs() < 1e-9, "got {got}");
    }

    /// Bitmap + attribute (§8 scenario 6): three data elements, a bitmap over
    /// them ("++-"), then one `0 33 007` attribute routed by the bitmap onto
    /// the first data element.
    #[test]
    fn bitmap_with_attribute_round_trips() {
        let info_block = Arc::new(VarInfo::new(Code::new(0, 1, 1), "WMO BLOCK NUMBER", "NUMERIC", "NUMERIC", 0, 0, 0, 7, false));
        let info_station = Arc::new(VarInfo::new(Code::new(0, 1, 2), "WMO STATION NUMBER", "NUMERIC", "NUMERIC", 0, 0, 0, 10, false));
        let info_height = Arc::new(VarInfo::new(Code::new(0, 7, 1), "HEIGHT OF STATION", "M", "M", 0, 0, -400, 15, false));
        let info_bit = Arc::new(VarInfo::new(Code::new(0, 31, 31), "DATA PRESENT INDICATOR", "CCITT IA5", "CCITT IA5", 0, 0, 0, 1, false));
        let info_conf = Arc::new(VarInfo::new(Code::new(0, 33, 7), "PER CENT CONFIDENCE", "%", "%", 0, 0, 0, 7, false));

        let mut block = Var::new(Arc::clone(&info_block), Value::Int(10));
        block.push_attr(Var::new(Arc::clone(&info_conf), Value::Int(90)));
        let subset = vec![
            block,
            Var::new(Arc::clone(&info_station), Value::Int(200)),
            Var::new(Arc::clone(&info_height), Value::Int(50)),
            Var::new(Arc::clone(&info_bit), Value::Int(1)),
            Var::new(Arc::clone(&info_bit), Value::Int(1)),
            Var::new(Arc::clone(&info_bit), Value::Int(0)),
        ];
        let bulletin = Bulletin {
            edition: Edition::Edition4,
            ident: sample_ident(),
            optional_section: None,
            datadesc: vec![
                Code::new(0, 1, 1),
                Code::new(0, 1, 2),
                Code::new(0, 7, 1),
                Code::new(2, 22, 0),
                Code::new(1, 1, 0),
                Code::new(0, 31, 31),
                Code::new(0, 33, 7),
            ],
            compression: false,
            observed: true,
            subsets: vec![subset],
        };
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        let subset = &decoded.subsets[0];
        assert_eq!(subset[0].value().as_i64(), Some(10));
        let attr = subset[0].attr(Code::new(0, 33, 7)).expect("attribute attached to first var");
        assert_eq!(attr.value().as_i64(), Some(90));
        assert_eq!(subset[3].value().as_i64(), Some(1));
        assert_eq!(subset[4].value().as_i64(), Some(1));
        assert_eq!(subset[5].value().as_i64(), Some(0));
    }

    /// §8 scenario 6 in full: "++-" marks *two* present positions, so two
    /// `0 33 007` attributes follow, routed onto the first and second data
    /// elements respectively.
    #[test]
    fn bitmap_routes_attributes_to_both_present_positions() {
        let info_block = Arc::new(VarInfo::new(Code::new(0, 1, 1), "WMO BLOCK NUMBER", "NUMERIC", "NUMERIC", 0, 0, 0, 7, false));
        let info_station = Arc::new(VarInfo::new(Code::new(0, 1, 2), "WMO STATION NUMBER", "NUMERIC", "NUMERIC", 0, 0, 0, 10, false));
        let info_height = Arc::new(VarInfo::new(Code::new(0, 7, 1), "HEIGHT OF STATION", "M", "M", 0, 0, -400, 15, false));
        let info_bit = Arc::new(VarInfo::new(Code::new(0, 31, 31), "DATA PRESENT INDICATOR", "CCITT IA5", "CCITT IA5", 0, 0, 0, 1, false));
        let info_conf = Arc::new(VarInfo::new(Code::new(0, 33, 7), "PER CENT CONFIDENCE", "%", "%", 0, 0, 0, 7, false));

        let mut block = Var::new(Arc::clone(&info_block), Value::Int(10));
        block.push_attr(Var::new(Arc::clone(&info_conf), Value::Int(90)));
        let mut station = Var::new(Arc::clone(&info_station), Value::Int(200));
        station.push_attr(Var::new(Arc::clone(&info_conf), Value::Int(70)));
        let subset = vec![
            block,
            station,
            Var::new(Arc::clone(&info_height), Value::Int(50)),
            Var::new(Arc::clone(&info_bit), Value::Int(1)),
            Var::new(Arc::clone(&info_bit), Value::Int(1)),
            Var::new(Arc::clone(&info_bit), Value::Int(0)),
        ];
        let bulletin = Bulletin {
            edition: Edition::Edition4,
            ident: sample_ident(),
            optional_section: None,
            datadesc: vec![
                Code::new(0, 1, 1),
                Code::new(0, 1, 2),
                Code::new(0, 7, 1),
                Code::new(2, 22, 0),
                Code::new(1, 1, 0),
                Code::new(0, 31, 31),
                Code::new(0, 33, 7),
                Code::new(0, 33, 7),
            ],
            compression: false,
            observed: true,
            subsets: vec![subset],
        };
        let vartable = StandardVartable;
        let dtable = StandardDtable;
        let encoded = encode_bufr(&bulletin, &vartable, &dtable, &IdentityConverter, &EncodeOptions::default()).unwrap();
        let decoded = decode_bufr(&encoded, &vartable, &dtable, &IdentityConverter, &DecodeOptions { convert_units: false }).unwrap();
        let subset = &decoded.subsets[0];
        let block_attr = subset[0].attr(Code::new(0, 33, 7)).expect("attribute attached to block");
        assert_eq!(block_attr.value().as_i64(), Some(90));
        let station_attr = subset[1].attr(Code::new(0, 33, 7)).expect("attribute attached to station");
        assert_eq!(station_attr.value().as_i64(), Some(70));
    }

    fn sample_ident() -> Identification {
        Identification {
            master_table: 0,
            centre: 98,
            master_table_version: 28,
            year: 2024,
            month: 1,
            day: 1,
            ..Identification::default()
        }
    }

    fn sample_bulletin_with(values: Vec<Value>) -> Bulletin {
        let info = Arc::new(VarInfo::new(Code::new(0, 12, 1), "TEMPERATURE", "K", "K", 1, 1, -4096, 13, false));
        let subsets = values
            .into_iter()
            .map(|v| vec![Var::new(Arc::clone(&info), v)])
            .collect();
        Bulletin {
            edition: Edition::Edition4,
            ident: sample_ident(),
            optional_section: None,
            datadesc: vec![Code::new(0, 12, 1)],
            compression: false,
            observed: true,
            subsets,
        }
    }
}
