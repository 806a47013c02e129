//! The uncompressed field codec (§4.4): one wire value per field per
//! subset, with the DDS interpreter run once per subset.

use std::sync::Arc;

use bufr_core::error::DecodePath;
use bufr_core::{Code, Value, Var, VarInfo};
use bufr_encoding::{BitReader, BitWriter, UnitConverter};

use crate::error::{self, Result};
use crate::interpreter::Visitor;

fn all_ones(n: u32) -> u32 {
    if n == 0 {
        0
    } else if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}

/// Encode one field's value to the bit writer, per §4.4.
pub fn encode_field(
    out: &mut BitWriter,
    info: &VarInfo,
    bit_len: u32,
    scale: i32,
    units: &dyn UnitConverter,
    value: &Value,
    path: &DecodePath,
) -> Result<()> {
    if bit_len == 0 {
        return Ok(());
    }
    if info.is_string {
        return match value {
            Value::Missing => Ok(out.write_missing(bit_len)?),
            Value::Str(s) => Ok(out.write_string(s, bit_len)?),
            _ => Err(error::Error::Core {
                source: bufr_core::Error::InvariantViolation {
                    message: format!("{} is a string field but got {value}", info.code),
                    path: path.clone(),
                },
            }),
        };
    }
    if value.is_missing() {
        out.write_missing(bit_len)?;
        return Ok(());
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
    if ival < 0 || ival > i64::from(all_ones(bit_len)) {
        return Err(error::Error::Core {
            source: bufr_core::Error::ValueOutOfRange {
                value: ival,
                bit_len,
                bit_ref: info.bit_ref,
                path: path.clone(),
            },
        });
    }
    out.write_bits(ival as u32, bit_len)?;
    Ok(())
}

/// Decode one field's value from the bit reader, per §4.4.
pub fn decode_field(
    reader: &mut BitReader<'_>,
    info: &VarInfo,
    bit_len: u32,
    scale: i32,
    units: &dyn UnitConverter,
    convert_units: bool,
    _path: &DecodePath,
) -> Result<Value> {
    if bit_len == 0 {
        return Ok(Value::Missing);
    }
    if info.is_string {
        let (text, missing) = reader.read_string(bit_len)?;
        return Ok(if missing { Value::Missing } else { Value::Str(text) });
    }
    let raw = reader.read_bits(bit_len)?;
    if raw == all_ones(bit_len) {
        return Ok(Value::Missing);
    }
    let ival = i64::from(raw) + info.bit_ref;
    let dval = ival as f64 * 10f64.powi(-scale);
    let reported = if convert_units {
        units.convert(dval, &info.bufr_unit, &info.unit)
    } else {
        dval
    };
    Ok(Value::Double(reported))
}

/// Encodes one subset: pulls values from a flat `Var` slice in descriptor
/// order, attaching bitmap-routed attributes from the owning variable's
/// attribute list instead of the linear stream.
#[derive(Debug)]
pub struct EncodeVisitor<'a> {
    subset: &'a [Var],
    next: usize,
    data_seen: Vec<&'a Var>,
    units: &'a dyn UnitConverter,
    out: &'a mut BitWriter,
}

impl<'a> EncodeVisitor<'a> {
    /// Build a visitor over one subset's flat variable list.
    pub fn new(subset: &'a [Var], units: &'a dyn UnitConverter, out: &'a mut BitWriter) -> Self {
        EncodeVisitor {
            subset,
            next: 0,
            data_seen: Vec::new(),
            units,
            out,
        }
    }

    fn next_var(&mut self, code: Code, path: &DecodePath) -> Result<&'a Var> {
        let var = self
            .subset
            .get(self.next)
            .ok_or_else(|| error::Error::Core {
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
        self.next += 1;
        Ok(var)
    }
}

impl Visitor for EncodeVisitor<'_> {
    fn on_b_data(
        &mut self,
        info: &Arc<VarInfo>,
        position_hint: Option<usize>,
        bit_len: u32,
        scale: i32,
        path: &DecodePath,
    ) -> Result<()> {
        let value = if let Some(idx) = position_hint {
            let owner = *self
                .data_seen
                .get(idx)
                .ok_or_else(|| error::Error::BitmapError {
                    message: "bitmap position has no prior data variable".into(),
                    path: path.clone(),
                })?;
            owner
                .attr(info.code)
                .map(Var::value)
                .cloned()
                .unwrap_or(Value::Missing)
        } else {
            let var = self.next_var(info.code, path)?;
            if !info.code.is_attribute() {
                self.data_seen.push(var);
            }
            var.value().clone()
        };
        encode_field(self.out, info, bit_len, scale, self.units, &value, path)
    }

    fn on_bitmap(&mut self, count: u32, path: &DecodePath) -> Result<Vec<bool>> {
        let bit_code = Code::new(0, 31, 31);
        let mut bits = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let var = self.next_var(bit_code, path)?;
            let present = matches!(var.value(), Value::Int(1));
            bits.push(present);
            self.out.write_bits(if present { 1 } else { 0 }, 1)?;
        }
        Ok(bits)
    }

    fn define_delayed_replication_factor(
        &mut self,
        factor_code: Code,
        path: &DecodePath,
    ) -> Result<u32> {
        let var = self.next_var(factor_code, path)?;
        let count = var.value().as_i64().ok_or_else(|| error::Error::Core {
            source: bufr_core::Error::InvariantViolation {
                message: "delayed replication factor is not numeric".into(),
                path: path.clone(),
            },
        })?;
        Ok(count as u32)
    }
}

/// Decodes one subset: reads values off the bit reader in descriptor order,
/// attaching bitmap-routed attributes to the owning `Var` rather than
/// appending them as flat entries.
#[derive(Debug)]
pub struct DecodeVisitor<'r, 'u> {
    reader: &'r mut BitReader<'r>,
    units: &'u dyn UnitConverter,
    convert_units: bool,
    /// The flat subset built so far, in descriptor order.
    pub subset: Vec<Var>,
    data_indices: Vec<usize>,
}

impl<'r, 'u> DecodeVisitor<'r, 'u> {
    /// Build a visitor reading from the given bit reader.
    pub fn new(reader: &'r mut BitReader<'r>, units: &'u dyn UnitConverter, convert_units: bool) -> Self {
        DecodeVisitor {
            reader,
            units,
            convert_units,
            subset: Vec::new(),
            data_indices: Vec::new(),
        }
    }
}

impl Visitor for DecodeVisitor<'_, '_> {
    fn on_b_data(
        &mut self,
        info: &Arc<VarInfo>,
        position_hint: Option<usize>,
        bit_len: u32,
        scale: i32,
        path: &DecodePath,
    ) -> Result<()> {
        let value = decode_field(
            self.reader,
            info,
            bit_len,
            scale,
            self.units,
            self.convert_units,
            path,
        )?;
        let var = Var::new(Arc::clone(info), value);
        if let Some(idx) = position_hint {
            let owner_idx =
                *self
                    .data_indices
                    .get(idx)
                    .ok_or_else(|| error::Error::BitmapError {
                        message: "bitmap position has no prior data variable".into(),
                        path: path.clone(),
                    })?;
            self.subset[owner_idx].push_attr(var);
        } else {
            if !info.code.is_attribute() {
                self.data_indices.push(self.subset.len());
            }
            self.subset.push(var);
        }
        Ok(())
    }

    fn on_bitmap(&mut self, count: u32, _path: &DecodePath) -> Result<Vec<bool>> {
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
            let raw = self.reader.read_bits(1)?;
            let present = raw == 1;
            bits.push(present);
            self.subset.push(Var::new(
                Arc::clone(&info),
                Value::Int(i64::from(raw)),
            ));
        }
        Ok(bits)
    }

    fn define_delayed_replication_factor(
        &mut self,
        factor_code: Code,
        path: &DecodePath,
    ) -> Result<u32> {
        // Delayed replication factors are always plain 8 or 16 bit unsigned
        // counters; read as an 8 bit field unless the extended descriptor
        // (`0 31 002`) is in play.
        let width = if factor_code == Code::new(0, 31, 2) {
            16
        } else {
            8
        };
        let raw = self.reader.read_bits(width)?;
        if raw == all_ones(width) {
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
        self.subset
            .push(Var::new(info, Value::Int(i64::from(raw))));
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bufr_encoding::IdentityConverter;

    fn sample_info() -> VarInfo {
        VarInfo::new(Code::new(0, 1, 1), "WMO BLOCK NUMBER", "NUMERIC", "NUMERIC", 0, 0, 0, 7, false)
    }

    #[test]
    fn encode_then_decode_a_plain_integer() {
        let info = sample_info();
        let path = DecodePath::at_section(4);
        let mut w = BitWriter::new();
        encode_field(&mut w, &info, 7, 0, &IdentityConverter, &Value::Int(42), &path).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let v = decode_field(&mut r, &info, 7, 0, &IdentityConverter, false, &path).unwrap();
        assert_eq!(v.as_i64(), Some(42));
    }

    #[test]
    fn encode_then_decode_missing() {
        let info = sample_info();
        let path = DecodePath::at_section(4);
        let mut w = BitWriter::new();
        encode_field(&mut w, &info, 7, 0, &IdentityConverter, &Value::Missing, &path).unwrap();
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let v = decode_field(&mut r, &info, 7, 0, &IdentityConverter, false, &path).unwrap();
        assert!(v.is_missing());
    }

    #[test]
    fn value_out_of_range_is_rejected() {
        let info = sample_info();
        let path = DecodePath::at_section(4);
        let mut w = BitWriter::new();
        let err = encode_field(&mut w, &info, 7, 0, &IdentityConverter, &Value::Int(200), &path);
        assert!(err.is_err());
    }

    #[test]
    fn zero_bit_len_consumes_nothing() {
        let info = sample_info();
        let path = DecodePath::at_section(4);
        let mut w = BitWriter::new();
        encode_field(&mut w, &info, 0, 0, &IdentityConverter, &Value::Int(0), &path).unwrap();
        assert_eq!(w.finish().len(), 0);
    }
}
