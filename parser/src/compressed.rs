//! The compressed field codec (§4.5): one `base`/`diffbits`/per-subset
//! delta layout per field, covering every subset in a single pass.

use std::sync::Arc;

use bufr_core::error::DecodePath;
use bufr_core::{Code, Subset, Value, Var, VarInfo};
use bufr_encoding::{BitReader, BitWriter, UnitConverter};

use crate::error::{self, Result};
use crate::interpreter::Visitor;

fn all_ones_u32(n: u32) -> u32 {
    if n == 0 {
        0
    } else if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}

fn bits_needed(x: u64) -> u32 {
    if x == 0 {
        0
    } else {
        64 - x.leading_zeros()
    }
}

fn write_zero_bits(out: &mut BitWriter, mut n_bits: u32) -> Result<()> {
    while n_bits > 8 {
        out.write_bits(0, 8)?;
        n_bits -= 8;
    }
    if n_bits > 0 {
        out.write_bits(0, n_bits)?;
    }
    Ok(())
}

/// Integerize one numeric value the same way the uncompressed codec does
/// (units conversion, scaling, reference subtraction), without writing it.
fn integerize(
    info: &VarInfo,
    scale: i32,
    units: &dyn UnitConverter,
    value: &Value,
    bit_len: u32,
    path: &DecodePath,
) -> Result<Option<i64>> {
    if value.is_missing() {
        return Ok(None);
    }
    let dval = value.as_f64().ok_or_else(|| error::Error::Core {
        source: bufr_core::Error::InvariantViolation {
            message: format!("{} is a numeric field but got {value}", info.code),
            path: path.clone(),
        },
    })?;
    let converted = units.convert(dval, &info.unit, &info.bufr_unit);
    let scaled = if scale >= 0 {
        converted * 10f64.powi(scale)
    } else {
        converted / 10f64.powi(-scale)
    };
    let ival = scaled.round() as i64 - info.bit_ref;
    if ival < 0 || ival > i64::from(all_ones_u32(bit_len)) {
        return Err(error::Error::Core {
            source: bufr_core::Error::ValueOutOfRange {
                value: ival,
                bit_len,
                bit_ref: info.bit_ref,
                path: path.clone(),
            },
        });
    }
    Ok(Some(ival))
}

fn decode_binary(info: &VarInfo, scale: i32, units: &dyn UnitConverter, convert_units: bool, raw: i64) -> Value {
    let ival = raw + info.bit_ref;
    let dval = ival as f64 * 10f64.powi(-scale);
    let reported = if convert_units {
        units.convert(dval, &info.bufr_unit, &info.unit)
    } else {
        dval
    };
    Value::Double(reported)
}

/// Encode one field across every subset, per §4.5.
pub fn encode_compressed_field(
    out: &mut BitWriter,
    info: &VarInfo,
    bit_len: u32,
    scale: i32,
    units: &dyn UnitConverter,
    values: &[Value],
    path: &DecodePath,
) -> Result<()> {
    if bit_len == 0 {
        return Ok(());
    }
    if info.is_string {
        encode_compressed_string(out, bit_len, values, path)
    } else {
        encode_compressed_numeric(out, info, bit_len, scale, units, values, path)
    }
}

fn encode_compressed_numeric(
    out: &mut BitWriter,
    info: &VarInfo,
    bit_len: u32,
    scale: i32,
    units: &dyn UnitConverter,
    values: &[Value],
    path: &DecodePath,
) -> Result<()> {
    let integerized: Vec<Option<i64>> = values
        .iter()
        .map(|v| integerize(info, scale, units, v, bit_len, path))
        .collect::<Result<_>>()?;

    let present: Vec<i64> = integerized.iter().filter_map(|v| *v).collect();
    if present.is_empty() {
        out.write_missing(bit_len)?;
        out.write_bits(0, 6)?;
        return Ok(());
    }

    let base = *present.iter().min().unwrap();
    let max_delta = present.iter().map(|v| (v - base) as u64).max().unwrap_or(0);
    let any_missing = integerized.iter().any(Option::is_none);
    let mut diffbits = bits_needed(max_delta);
    if any_missing && (diffbits == 0 || max_delta >= u64::from(all_ones_u32(diffbits))) {
        diffbits += 1;
    }

    out.write_bits(base as u32, bit_len)?;
    out.write_bits(diffbits, 6)?;
    for v in &integerized {
        match v {
            Some(val) => out.write_bits((val - base) as u32, diffbits)?,
            None => out.write_missing(diffbits)?,
        }
    }
    Ok(())
}

fn encode_compressed_string(
    out: &mut BitWriter,
    bit_len: u32,
    values: &[Value],
    path: &DecodePath,
) -> Result<()> {
    if values.iter().all(Value::is_missing) {
        out.write_missing(bit_len)?;
        out.write_bits(0, 6)?;
        return Ok(());
    }

    let present: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
    let shared = !present.is_empty() && present.iter().all(|s| *s == present[0]) && values.iter().all(|v| !v.is_missing());

    if shared {
        out.write_string(present[0], bit_len)?;
        out.write_bits(0, 6)?;
        return Ok(());
    }

    let base_len_bytes = bit_len / 8;
    write_zero_bits(out, bit_len)?;
    out.write_bits(base_len_bytes, 6)?;
    for v in values {
        match v {
            Value::Str(s) => out.write_string(s, 8 * base_len_bytes)?,
            Value::Missing => out.write_missing(8 * base_len_bytes)?,
            other => {
                return Err(error::Error::Core {
                    source: bufr_core::Error::InvariantViolation {
                        message: format!("expected a string value, got {other}"),
                        path: path.clone(),
                    },
                })
            }
        }
    }
    Ok(())
}

/// Decode one field across `n_subsets` subsets, per §4.5.
pub fn decode_compressed_field(
    reader: &mut BitReader<'_>,
    info: &VarInfo,
    bit_len: u32,
    scale: i32,
    units: &dyn UnitConverter,
    convert_units: bool,
    n_subsets: usize,
    path: &DecodePath,
) -> Result<Vec<Value>> {
    if bit_len == 0 {
        return Ok(vec![Value::Missing; n_subsets]);
    }
    if info.is_string {
        decode_compressed_string(reader, bit_len, n_subsets, path)
    } else {
        decode_compressed_numeric(reader, info, bit_len, scale, units, convert_units, n_subsets)
    }
}

fn decode_compressed_numeric(
    reader: &mut BitReader<'_>,
    info: &VarInfo,
    bit_len: u32,
    scale: i32,
    units: &dyn UnitConverter,
    convert_units: bool,
    n_subsets: usize,
) -> Result<Vec<Value>> {
    let base_raw = reader.read_bits(bit_len)?;
    let base_missing = base_raw == all_ones_u32(bit_len);
    let diffbits = reader.read_bits(6)?;

    if base_missing && diffbits == 0 {
        return Ok(vec![Value::Missing; n_subsets]);
    }
    if diffbits == 0 {
        let value = decode_binary(info, scale, units, convert_units, i64::from(base_raw));
        return Ok(vec![value; n_subsets]);
    }
    let mut out = Vec::with_capacity(n_subsets);
    for _ in 0..n_subsets {
        let delta = reader.read_bits(diffbits)?;
        if delta == all_ones_u32(diffbits) {
            out.push(Value::Missing);
        } else {
            let raw = i64::from(base_raw) + i64::from(delta);
            out.push(decode_binary(info, scale, units, convert_units, raw));
        }
    }
    Ok(out)
}

fn decode_compressed_string(
    reader: &mut BitReader<'_>,
    bit_len: u32,
    n_subsets: usize,
    path: &DecodePath,
) -> Result<Vec<Value>> {
    let (base_text, base_missing) = reader.read_string(bit_len)?;
    let diffbits = reader.read_bits(6)?;

    if base_missing && diffbits == 0 {
        return Ok(vec![Value::Missing; n_subsets]);
    }
    if diffbits == 0 {
        return Ok(vec![Value::Str(base_text); n_subsets]);
    }

    if !base_text.is_empty() {
        return Err(error::Error::CompressedStringUnsupported {
            message: "compressed string base must be all-zero when diffbits != 0".into(),
            path: path.clone(),
        });
    }
    let base_len_bytes = bit_len / 8;
    if diffbits > base_len_bytes {
        return Err(error::Error::CompressedStringUnsupported {
            message: "diffbits exceeds base length".into(),
            path: path.clone(),
        });
    }

    let mut out = Vec::with_capacity(n_subsets);
    for _ in 0..n_subsets {
        let (text, missing) = reader.read_string(8 * diffbits)?;
        out.push(if missing { Value::Missing } else { Value::Str(text) });
    }
    Ok(out)
}

/// Encodes every subset at once: pulls one value per subset at each
/// descriptor, per the compressed layout.
#[derive(Debug)]
pub struct CompressedEncodeVisitor<'a> {
    subsets: &'a [Subset],
    next: usize,
    data_seen: Vec<usize>,
    units: &'a dyn UnitConverter,
    out: &'a mut BitWriter,
}

impl<'a> CompressedEncodeVisitor<'a> {
    /// Build a visitor over every subset's flat variable list. All subsets
    /// are expected to share the same descriptor structure.
    pub fn new(subsets: &'a [Subset], units: &'a dyn UnitConverter, out: &'a mut BitWriter) -> Self {
        CompressedEncodeVisitor {
            subsets,
            next: 0,
            data_seen: Vec::new(),
            units,
            out,
        }
    }

    fn column_at(&self, index: usize, code: Code, path: &DecodePath) -> Result<Vec<Value>> {
        self.subsets
            .iter()
            .map(|s| {
                let var = s.get(index).ok_or_else(|| error::Error::Core {
                    source: bufr_core::Error::DescriptorMismatch {
                        expected: code,
                        got: Code::new(0, 0, 0),
                        path: path.clone(),
                    },
                })?;
                if var.code() != code {
                    return Err(error::Error::Core {
                        source: bufr_core::Error::DescriptorMismatch {
                            expected: code,
                            got: var.code(),
                            path: path.clone(),
                        },
                    });
                }
                Ok(var.value().clone())
            })
            .collect()
    }
}

impl Visitor for CompressedEncodeVisitor<'_> {
    fn on_b_data(
        &mut self,
        info: &Arc<VarInfo>,
        position_hint: Option<usize>,
        bit_len: u32,
        scale: i32,
        path: &DecodePath,
    ) -> Result<()> {
        let values = if let Some(idx) = position_hint {
            let owner_idx = *self
                .data_seen
                .get(idx)
                .ok_or_else(|| error::Error::BitmapError {
                    message: "bitmap position has no prior data variable".into(),
                    path: path.clone(),
                })?;
            self.subsets
                .iter()
                .map(|s| {
                    s[owner_idx]
                        .attr(info.code)
                        .map(Var::value)
                        .cloned()
                        .unwrap_or(Value::Missing)
                })
                .collect()
        } else {
            let values = self.column_at(self.next, info.code, path)?;
            if !info.code.is_attribute() {
                self.data_seen.push(self.next);
            }
            self.next += 1;
            values
        };
        encode_compressed_field(self.out, info, bit_len, scale, self.units, &values, path)
    }

    fn on_bitmap(&mut self, count: u32, path: &DecodePath) -> Result<Vec<bool>> {
        let bit_code = Code::new(0, 31, 31);
        let mut bits = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let values = self.column_at(self.next, bit_code, path)?;
            let present = matches!(values[0], Value::Int(1));
            self.out.write_bits(if present { 1 } else { 0 }, 1)?;
            self.out.write_bits(0, 6)?;
            bits.push(present);
            self.next += 1;
        }
        Ok(bits)
    }

    fn define_delayed_replication_factor(
        &mut self,
        factor_code: Code,
        path: &DecodePath,
    ) -> Result<u32> {
        let values = self.column_at(self.next, factor_code, path)?;
        self.next += 1;
        let count = values[0].as_i64().ok_or_else(|| error::Error::Core {
            source: bufr_core::Error::InvariantViolation {
                message: "delayed replication factor is not numeric".into(),
                path: path.clone(),
            },
        })?;
        Ok(count as u32)
    }
}

/// Decodes every subset at once, producing `n_subsets` parallel `Var`
/// columns that are later transposed into per-subset rows.
#[derive(Debug)]
pub struct CompressedDecodeVisitor<'r, 'u> {
    reader: &'r mut BitReader<'r>,
    units: &'u dyn UnitConverter,
    convert_units: bool,
    n_subsets: usize,
    /// One flat descriptor-ordered row of `Var`s per subset, built in
    /// lockstep.
    pub subsets: Vec<Subset>,
    data_indices: Vec<usize>,
}

impl<'r, 'u> CompressedDecodeVisitor<'r, 'u> {
    /// Build a visitor reading `n_subsets` columns at a time.
    pub fn new(
        reader: &'r mut BitReader<'r>,
        units: &'u dyn UnitConverter,
        convert_units: bool,
        n_subsets: usize,
    ) -> Self {
        CompressedDecodeVisitor {
            reader,
            units,
            convert_units,
            n_subsets,
            subsets: vec![Vec::new(); n_subsets],
            data_indices: Vec::new(),
        }
    }
}

impl Visitor for CompressedDecodeVisitor<'_, '_> {
    fn on_b_data(
        &mut self,
        info: &Arc<VarInfo>,
        position_hint: Option<usize>,
        bit_len: u32,
        scale: i32,
        path: &DecodePath,
    ) -> Result<()> {
        let values = decode_compressed_field(
            self.reader,
            info,
            bit_len,
            scale,
            self.units,
            self.convert_units,
            self.n_subsets,
            path,
        )?;

        if let Some(idx) = position_hint {
            let owner_idx = *self
                .data_indices
                .get(idx)
                .ok_or_else(|| error::Error::BitmapError {
                    message: "bitmap position has no prior data variable".into(),
                    path: path.clone(),
                })?;
            for (subset, value) in self.subsets.iter_mut().zip(values) {
                subset[owner_idx].push_attr(Var::new(Arc::clone(info), value));
            }
        } else {
            if !info.code.is_attribute() {
                self.data_indices.push(self.subsets[0].len());
            }
            for (subset, value) in self.subsets.iter_mut().zip(values) {
                subset.push(Var::new(Arc::clone(info), value));
            }
        }
        Ok(())
    }

    fn on_bitmap(&mut self, count: u32, path: &DecodePath) -> Result<Vec<bool>> {
        let bit_code = Code::new(0, 31, 31);
        let info = Arc::new(VarInfo::new(
            bit_code,
            "DATA PRESENT INDICATOR",
            "CCITT IA5",
            "CCITT IA5",
            0,
            0,
            0,
            1,
            false,
        ));
        let mut bits = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let flag = self.reader.read_bits(1)? == 1;
            let diffbits = self.reader.read_bits(6)?;
            if diffbits != 0 {
                return Err(error::Error::BitmapError {
                    message: "compressed bitmap bit carries non-zero diffbits".into(),
                    path: path.clone(),
                });
            }
            bits.push(flag);
            for subset in self.subsets.iter_mut() {
                subset.push(Var::new(Arc::clone(&info), Value::Int(i64::from(flag))));
            }
        }
        Ok(bits)
    }

    fn define_delayed_replication_factor(
        &mut self,
        factor_code: Code,
        path: &DecodePath,
    ) -> Result<u32> {
        let width = if factor_code == Code::new(0, 31, 2) { 16 } else { 8 };
        let raw = self.reader.read_bits(width)?;
        if raw == all_ones_u32(width) {
            return Err(error::Error::MissingDelayedFactor { path: path.clone() });
        }
        let info = Arc::new(VarInfo::new(
            factor_code,
            "DELAYED DESCRIPTOR REPLICATION FACTOR",
            "NUMERIC",
            "NUMERIC",
            0,
            0,
            0,
            width,
            false,
        ));
        for subset in self.subsets.iter_mut() {
            subset.push(Var::new(Arc::clone(&info), Value::Int(i64::from(raw))));
        }
        Ok(raw)
    }
}
