//! The `Var`/`Subset` data model: one decoded data item, and the ordered
//! row of items that makes up one subset.

use crate::descriptor::Code;
use crate::value::Value;
use crate::varinfo::VarInfo;
use std::fmt;
use std::sync::Arc;

/// One data item: a descriptor code, the metadata that governs how it is
/// encoded, its value, and any attributes (`F=0, X=33` descriptors)
/// attached to it through a data-present bitmap.
///
/// `info` is shared (via [`Arc`]) because the same [`VarInfo`] is reused
/// across every subset row carrying that descriptor, and across altered
/// variants produced by the same table lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    info: Arc<VarInfo>,
    value: Value,
    attrs: Vec<Var>,
}

impl Var {
    /// Build a variable with a value already known.
    pub fn new(info: Arc<VarInfo>, value: Value) -> Self {
        Var {
            info,
            value,
            attrs: Vec::new(),
        }
    }

    /// Build a missing variable for the given metadata.
    pub fn missing(info: Arc<VarInfo>) -> Self {
        Var::new(info, Value::Missing)
    }

    /// The descriptor code that identifies this variable.
    pub fn code(&self) -> Code {
        self.info.code
    }

    /// The metadata governing this variable's encoding.
    pub fn info(&self) -> &VarInfo {
        &self.info
    }

    /// Share a reference to this variable's metadata.
    pub fn info_arc(&self) -> Arc<VarInfo> {
        Arc::clone(&self.info)
    }

    /// This variable's value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether this variable's value is missing.
    pub fn is_missing(&self) -> bool {
        self.value.is_missing()
    }

    /// The ordered sequence of attributes attached to this variable.
    pub fn attrs(&self) -> &[Var] {
        &self.attrs
    }

    /// Attach an attribute (must itself carry an `F=0, X=33` descriptor;
    /// this is a data-model convenience, not re-validated here since
    /// construction of the attribute already went through the same table
    /// lookup as any other element).
    pub fn push_attr(&mut self, attr: Var) {
        self.attrs.push(attr);
    }

    /// Find an attribute by its descriptor code.
    pub fn attr(&self, code: Code) -> Option<&Var> {
        self.attrs.iter().find(|a| a.code() == code)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.info.code, self.value)?;
        for attr in &self.attrs {
            write!(f, " <{attr}>")?;
        }
        Ok(())
    }
}

/// An ordered sequence of [`Var`], one per data descriptor after expansion,
/// representing one row of observations.
pub type Subset = Vec<Var>;

#[cfg(test)]
mod tests {
    use super::*;

    fn info(code: Code) -> Arc<VarInfo> {
        Arc::new(VarInfo::new(code, "desc", "unit", "unit", 0, 0, 0, 8, false))
    }

    #[test]
    fn missing_var_has_no_value() {
        let v = Var::missing(info(Code::new(0, 1, 1)));
        assert!(v.is_missing());
    }

    #[test]
    fn attribute_lookup_by_code() {
        let mut v = Var::new(info(Code::new(0, 1, 1)), Value::Int(3));
        let attr_code = Code::new(0, 33, 7);
        v.push_attr(Var::new(info(attr_code), Value::Int(90)));
        assert!(v.attr(attr_code).is_some());
        assert!(v.attr(Code::new(0, 33, 8)).is_none());
    }
}
