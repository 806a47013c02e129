//! The DDS (data descriptor stream) interpreter: the recursive walk over an
//! expanded descriptor stream that drives both the uncompressed and
//! compressed field codecs.
//!
//! The walk itself (replication, C-modifiers, sequence expansion, bitmap
//! cursor bookkeeping) is shared code; what happens at each element leaf is
//! delegated to a [`Visitor`], so the same walk drives both directions
//! (encode/decode) and both layouts (uncompressed/compressed) of §4.4-4.5.

use std::sync::Arc;

use bufr_core::error::DecodePath;
use bufr_core::{Code, Opcodes, VarInfo, F};
use bufr_encoding::{Dtable, Vartable};
use snafu::ensure;

use crate::error::{self, Result};

/// The running state of C-modifier operators (`F=2`). Persists across the
/// whole walk (not scoped to a sequence or replication group) until reset by
/// an explicit cancelling operator.
#[derive(Debug, Clone, Default)]
pub struct CModState {
    /// `C 1 Y` width change, added to `info.bit_len` for numeric fields.
    pub width_change: i32,
    /// `C 2 Y` scale change, added to `info.bufr_scale`.
    pub scale_change: i32,
    /// `C 8 Y` string length override, in characters; `0` means cleared.
    pub string_len_override: u32,
    /// Set by `C 22 000`/`C 23 000`: the next replication descriptor
    /// defines a data-present bitmap rather than an ordinary group.
    pub bitmap_pending: bool,
    /// Set by `C 23 255`: the bitmap cursor has already been advanced for
    /// the next `F=0, X=33` descriptor, which should use this position
    /// without advancing again.
    pub forced_position_hint: Option<usize>,
}

/// The data-present bitmap established by a `C 22/23 000` operator, and the
/// cursor into it used for attribute attachment (§4.3 bitmap cursor
/// advance).
#[derive(Debug, Clone, Default)]
pub struct BitmapState {
    /// `true` for `'+'` (present), `false` for `'-'` (absent).
    pub bits: Vec<bool>,
    use_cur: isize,
    subset_cur: isize,
}

impl BitmapState {
    /// No bitmap currently active.
    pub fn empty() -> Self {
        BitmapState::default()
    }

    /// Install a freshly read or written bitmap, cursor reset to the start.
    pub fn new(bits: Vec<bool>) -> Self {
        BitmapState {
            bits,
            use_cur: -1,
            subset_cur: -1,
        }
    }

    /// Whether a bitmap is currently in effect.
    pub fn is_active(&self) -> bool {
        !self.bits.is_empty()
    }

    /// Advance the cursor to the next `'+'` entry, skipping `'-'` entries,
    /// and return the subset position (count of prior data variables) it
    /// now points to.
    pub fn advance(&mut self, path: &DecodePath) -> Result<usize> {
        loop {
            self.use_cur += 1;
            self.subset_cur += 1;
            ensure!(
                (self.use_cur as usize) < self.bits.len(),
                error::BitmapErrorSnafu {
                    message: "bitmap cursor exhausted the bitmap",
                    path: path.clone(),
                }
            );
            if self.bits[self.use_cur as usize] {
                return Ok(self.subset_cur as usize);
            }
        }
    }
}

/// The capability set a concrete encoder/decoder exposes to the walk.
///
/// `on_b_data` is invoked once per element descriptor (`F=0`), whether an
/// ordinary data item or an attribute; `position_hint` carries the bitmap
/// subset position when the attribute is bitmap-routed, and is `None`
/// otherwise. `on_bitmap` handles an entire data-present bitmap replication
/// as one unit (its internal layout differs between the uncompressed and
/// compressed codecs, per §4.5's compressed bitmap quirk).
pub trait Visitor {
    /// Process one element descriptor.
    fn on_b_data(
        &mut self,
        info: &Arc<VarInfo>,
        position_hint: Option<usize>,
        bit_len: u32,
        scale: i32,
        path: &DecodePath,
    ) -> Result<()>;

    /// Consume or produce an entire data-present bitmap of `count` bits.
    fn on_bitmap(&mut self, count: u32, path: &DecodePath) -> Result<Vec<bool>>;

    /// Resolve a delayed replication factor, reading the factor descriptor's
    /// metadata from the table for context.
    fn define_delayed_replication_factor(&mut self, factor_code: Code, path: &DecodePath)
        -> Result<u32>;

    /// Called when entering a table D sequence expansion.
    fn on_sequence_enter(&mut self, _code: Code) {}

    /// Called when leaving a table D sequence expansion.
    fn on_sequence_exit(&mut self) {}
}

/// The effective bit width and scale for an element, after applying the
/// current C-modifier state (§4.3).
pub fn effective_params(info: &VarInfo, cmod: &CModState) -> (u32, i32) {
    let bit_len = if info.is_string {
        if cmod.string_len_override != 0 {
            8 * cmod.string_len_override
        } else {
            info.bit_len
        }
    } else {
        (info.bit_len as i64 + i64::from(cmod.width_change)).max(0) as u32
    };
    let scale = info.bufr_scale + cmod.scale_change;
    (bit_len, scale)
}

/// Drives `visitor` through `opcodes`, threading the interpreter state
/// across the whole walk (including recursive calls for replication and
/// sequence expansion).
pub struct Interpreter<'t, V> {
    vartable: &'t dyn Vartable,
    dtable: &'t dyn Dtable,
    /// The concrete encoder or decoder driving field-level behavior.
    pub visitor: V,
    /// Running C-modifier state.
    pub cmod: CModState,
    /// The currently active data-present bitmap, if any.
    pub bitmap: BitmapState,
    elements_seen: u32,
}

impl<'t, V: Visitor> Interpreter<'t, V> {
    /// Build an interpreter over the given table collaborators and visitor,
    /// with interpreter state reset to its initial value.
    pub fn new(vartable: &'t dyn Vartable, dtable: &'t dyn Dtable, visitor: V) -> Self {
        Interpreter {
            vartable,
            dtable,
            visitor,
            cmod: CModState::default(),
            bitmap: BitmapState::empty(),
            elements_seen: 0,
        }
    }

    /// Reset the per-subset element counter (used by uncompressed codec
    /// callers that run a fresh walk per subset); C-modifier and bitmap
    /// state persist across subsets, matching the wire's single running
    /// interpreter state.
    pub fn reset_element_counter(&mut self) {
        self.elements_seen = 0;
    }

    /// Walk the given top-level descriptor stream.
    #[tracing::instrument(level = "trace", skip(self, opcodes, path))]
    pub fn walk(&mut self, opcodes: Opcodes<'_>, path: &DecodePath) -> Result<()> {
        let mut i = 0usize;
        while i < opcodes.size() {
            let code = opcodes.get(i).expect("index bounded by opcodes.size()");
            match code.kind() {
                F::Element => {
                    self.handle_element(code, path)?;
                    i += 1;
                }
                F::Replication => {
                    i += 1;
                    i = self.handle_replication(code, &opcodes, i, path)?;
                }
                F::Operator => {
                    self.apply_operator(code, path)?;
                    i += 1;
                }
                F::Sequence => {
                    let expansion = self
                        .dtable
                        .query(code)
                        .map_err(|_| error::Error::UnknownDescriptor {
                            code,
                            path: path.clone(),
                        })?;
                    self.visitor.on_sequence_enter(code);
                    let sub_path = path.push(code);
                    self.walk(expansion, &sub_path)?;
                    self.visitor.on_sequence_exit();
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn handle_element(&mut self, code: Code, path: &DecodePath) -> Result<()> {
        let info = self
            .vartable
            .query(code)
            .map_err(|_| error::Error::UnknownDescriptor {
                code,
                path: path.clone(),
            })?;
        let (bit_len, scale) = effective_params(&info, &self.cmod);

        if code.is_attribute() {
            let position_hint = if let Some(pos) = self.cmod.forced_position_hint.take() {
                Some(pos)
            } else if self.bitmap.is_active() {
                Some(self.bitmap.advance(path)?)
            } else {
                None
            };
            self.visitor
                .on_b_data(&info, position_hint, bit_len, scale, path)?;
        } else {
            self.visitor.on_b_data(&info, None, bit_len, scale, path)?;
            self.elements_seen += 1;
        }
        Ok(())
    }

    fn handle_replication(
        &mut self,
        code: Code,
        opcodes: &Opcodes<'_>,
        mut i: usize,
        path: &DecodePath,
    ) -> Result<usize> {
        let group = code.x() as usize;
        let y = code.y();

        if self.cmod.bitmap_pending {
            self.cmod.bitmap_pending = false;
            let count = if y == 0 {
                self.elements_seen
            } else {
                u32::from(y)
            };
            let bits = self.visitor.on_bitmap(count, path)?;
            self.bitmap = BitmapState::new(bits);
        } else {
            let count = if y == 0 {
                let factor_code = opcodes
                    .get(i)
                    .ok_or_else(|| error::Error::MissingDelayedFactor { path: path.clone() })?;
                i += 1;
                self.visitor
                    .define_delayed_replication_factor(factor_code, path)?
            } else {
                u32::from(y)
            };
            let sub = opcodes.sub(i, Some(group));
            for _ in 0..count {
                self.walk(sub.clone(), path)?;
            }
        }
        Ok(i + group)
    }

    fn apply_operator(&mut self, code: Code, path: &DecodePath) -> Result<()> {
        match code.x() {
            1 => {
                self.cmod.width_change = if code.y() == 0 {
                    0
                } else {
                    i32::from(code.y()) - 128
                };
            }
            2 => {
                self.cmod.scale_change = if code.y() == 0 {
                    0
                } else {
                    i32::from(code.y()) - 128
                };
            }
            8 => {
                self.cmod.string_len_override = u32::from(code.y());
            }
            22 if code.y() == 0 => {
                self.cmod.bitmap_pending = true;
            }
            23 if code.y() == 0 => {
                self.cmod.bitmap_pending = true;
            }
            23 if code.y() == 255 => {
                let pos = self.bitmap.advance(path)?;
                self.cmod.forced_position_hint = Some(pos);
            }
            24 if code.y() == 0 => {
                // Informational marker ahead of a replication; no-op
                // pass-through (open question, see design notes).
            }
            _ => {
                return Err(error::Error::UnsupportedCModifier {
                    code,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_params_applies_width_and_scale_change() {
        let info = VarInfo::new(Code::new(0, 12, 1), "TEMPERATURE", "K", "K", 1, 1, -4096, 13, false);
        let mut cmod = CModState::default();
        cmod.width_change = 1;
        cmod.scale_change = 2;
        let (bit_len, scale) = effective_params(&info, &cmod);
        assert_eq!(bit_len, 14);
        assert_eq!(scale, 3);
    }

    #[test]
    fn effective_params_string_override_takes_precedence() {
        let info = VarInfo::new(Code::new(0, 1, 194), "NAME", "CCITT IA5", "CCITT IA5", 0, 0, 0, 160, true);
        let mut cmod = CModState::default();
        cmod.string_len_override = 5;
        let (bit_len, _scale) = effective_params(&info, &cmod);
        assert_eq!(bit_len, 40);
    }

    #[test]
    fn bitmap_advance_skips_minus_entries() {
        let path = DecodePath::at_section(4);
        let mut bitmap = BitmapState::new(vec![false, true, false, true]);
        assert_eq!(bitmap.advance(&path).unwrap(), 1);
        assert_eq!(bitmap.advance(&path).unwrap(), 3);
        assert!(bitmap.advance(&path).is_err());
    }
}
