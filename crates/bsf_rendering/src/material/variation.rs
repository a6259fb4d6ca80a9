//! # Shader Variations
//!
//! A named set of compile-time parameters that tells technique variants
//! apart, e.g. `{ QUALITY: 2, SKINNED: true }`.
//!
//! Values are compared by raw bits. An int `1` and a uint `1` are equal; a
//! float `1.0` is not.

use std::collections::BTreeMap;

use bsf_core::{SyncDomain, SyncFields, SyncStream};

/// How the bits of a [`VariationParam`] are meant to be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum VariationParamKind {
    /// Signed integer.
    #[default]
    Int = 0,
    /// Unsigned integer.
    UInt = 1,
    /// 32 bit float.
    Float = 2,
    /// Boolean, 0 or 1.
    Bool = 3,
}

impl VariationParamKind {
    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::UInt,
            2 => Self::Float,
            3 => Self::Bool,
            _ => Self::Int,
        }
    }
}

/// One variation value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VariationParam {
    /// Raw 32 bit value.
    pub bits: u32,
    /// Interpretation of `bits`.
    pub kind: VariationParamKind,
}

impl VariationParam {
    /// A signed integer value.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn int(value: i32) -> Self {
        Self { bits: value as u32, kind: VariationParamKind::Int }
    }

    /// An unsigned integer value.
    #[must_use]
    pub const fn uint(value: u32) -> Self {
        Self { bits: value, kind: VariationParamKind::UInt }
    }

    /// A float value.
    #[must_use]
    pub fn float(value: f32) -> Self {
        Self { bits: value.to_bits(), kind: VariationParamKind::Float }
    }

    /// A boolean value.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Self { bits: value as u32, kind: VariationParamKind::Bool }
    }

    /// Value as a signed integer.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_int(self) -> i32 {
        self.bits as i32
    }

    /// Value as a float.
    #[must_use]
    pub fn as_float(self) -> f32 {
        f32::from_bits(self.bits)
    }

    /// Value as a boolean.
    #[must_use]
    pub const fn as_bool(self) -> bool {
        self.bits != 0
    }
}

/// Ordered map of variation parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderVariation {
    params: BTreeMap<String, VariationParam>,
}

impl ShaderVariation {
    /// An empty variation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to an arbitrary value.
    pub fn set(&mut self, name: &str, param: VariationParam) {
        self.params.insert(name.to_string(), param);
    }

    /// Sets a signed integer parameter.
    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set(name, VariationParam::int(value));
    }

    /// Sets an unsigned integer parameter.
    pub fn set_uint(&mut self, name: &str, value: u32) {
        self.set(name, VariationParam::uint(value));
    }

    /// Sets a float parameter.
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set(name, VariationParam::float(value));
    }

    /// Sets a boolean parameter.
    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set(name, VariationParam::bool(value));
    }

    /// Builder form of [`set_int`](Self::set_int).
    #[must_use]
    pub fn with_int(mut self, name: &str, value: i32) -> Self {
        self.set_int(name, value);
        self
    }

    /// Builder form of [`set_uint`](Self::set_uint).
    #[must_use]
    pub fn with_uint(mut self, name: &str, value: u32) -> Self {
        self.set_uint(name, value);
        self
    }

    /// Builder form of [`set_float`](Self::set_float).
    #[must_use]
    pub fn with_float(mut self, name: &str, value: f32) -> Self {
        self.set_float(name, value);
        self
    }

    /// Builder form of [`set_bool`](Self::set_bool).
    #[must_use]
    pub fn with_bool(mut self, name: &str, value: bool) -> Self {
        self.set_bool(name, value);
        self
    }

    /// Looks up a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<VariationParam> {
        self.params.get(name).copied()
    }

    /// Removes a parameter.
    pub fn remove(&mut self, name: &str) -> Option<VariationParam> {
        self.params.remove(name)
    }

    /// Removes every parameter.
    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, VariationParam)> {
        self.params.iter().map(|(name, param)| (name.as_str(), *param))
    }

    /// Returns true if every parameter of `other` is present here with the
    /// same bits. With `exact`, both must also have the same parameter count.
    #[must_use]
    pub fn matches(&self, other: &Self, exact: bool) -> bool {
        if exact && self.len() != other.len() {
            return false;
        }
        other
            .params
            .iter()
            .all(|(name, param)| self.params.get(name).is_some_and(|own| own.bits == param.bits))
    }
}

impl<D: SyncDomain> SyncFields<D> for ShaderVariation {
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S) {
        let mut count = u32::try_from(self.params.len()).unwrap_or(u32::MAX);
        stream.pod(&mut count);

        if S::READING {
            self.params.clear();
            for _ in 0..count {
                let mut name = String::new();
                let mut raw = [0u32; 2];
                stream.string(&mut name);
                stream.pod(&mut raw);
                self.params.insert(
                    name,
                    VariationParam { bits: raw[1], kind: VariationParamKind::from_raw(raw[0]) },
                );
            }
        } else {
            for (name, param) in &self.params {
                let mut name = name.clone();
                let mut raw = [param.kind as u32, param.bits];
                stream.string(&mut name);
                stream.pod(&mut raw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_compare_by_bits() {
        let a = ShaderVariation::new().with_int("QUALITY", 1);
        let b = ShaderVariation::new().with_uint("QUALITY", 1);
        let c = ShaderVariation::new().with_float("QUALITY", 1.0);
        assert!(a.matches(&b, true));
        assert!(!a.matches(&c, true));
    }

    #[test]
    fn test_subset_match_unless_exact() {
        let full = ShaderVariation::new().with_int("QUALITY", 2).with_bool("SKINNED", true);
        let partial = ShaderVariation::new().with_bool("SKINNED", true);
        assert!(full.matches(&partial, false));
        assert!(!full.matches(&partial, true));
        assert!(!partial.matches(&full, false));
    }

    #[test]
    fn test_accessors() {
        let mut variation = ShaderVariation::new().with_int("LEVEL", -3).with_float("BIAS", 0.5);
        assert_eq!(variation.get("LEVEL").map(VariationParam::as_int), Some(-3));
        assert_eq!(variation.get("BIAS").map(VariationParam::as_float), Some(0.5));
        assert_eq!(variation.iter().map(|(name, _)| name).collect::<Vec<_>>(), ["BIAS", "LEVEL"]);

        assert!(variation.remove("LEVEL").is_some());
        assert_eq!(variation.len(), 1);
        variation.clear();
        assert!(variation.is_empty());
    }
}
