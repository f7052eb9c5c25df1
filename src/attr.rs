//! Read-only attribute bags attached to operator invocations.

use rustc_hash::FxHashMap;

use crate::ops::InferError;

/// A single scalar or list attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    IntList(Vec<i64>),
    String(String),
}

/// Name-indexed bag of operator attributes.
///
/// Built once per operator instance by the graph loader and read-only
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct AttrBag {
    attrs: FxHashMap<String, AttrValue>,
}

impl AttrBag {
    pub fn new() -> AttrBag {
        AttrBag::default()
    }

    /// Add an attribute. Intended for use by the graph loader and tests.
    pub fn set(mut self, name: &str, value: AttrValue) -> AttrBag {
        self.attrs.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.attrs.get(name) {
            Some(AttrValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.attrs.get(name) {
            Some(AttrValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.attrs.get(name) {
            Some(AttrValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int_list(&self, name: &str) -> Option<&[i64]> {
        match self.attrs.get(name) {
            Some(AttrValue::IntList(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::String(v)) => Some(v),
            _ => None,
        }
    }

    /// Like [`get_int`](AttrBag::get_int) but required.
    pub fn require_int(&self, name: &'static str) -> Result<i64, InferError> {
        self.get_int(name).ok_or(InferError::NullInput { what: name })
    }

    pub fn require_int_list(&self, name: &'static str) -> Result<&[i64], InferError> {
        self.get_int_list(name)
            .ok_or(InferError::NullInput { what: name })
    }

    pub fn require_string(&self, name: &'static str) -> Result<&str, InferError> {
        self.get_string(name)
            .ok_or(InferError::NullInput { what: name })
    }
}
