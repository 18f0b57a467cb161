//! Typed access to parsed JSON documents.
//!
//! The loader walks a `serde_json::Value` tree; this module wraps object
//! nodes so that a missing key surfaces as [`LoadError::MissingField`] and a
//! key holding the wrong JSON type as [`LoadError::InvalidFieldType`], both
//! naming the field.

use crate::engine::errors::LoadError;
use serde_json::{Map, Value as Json};

/// A borrowed JSON object with checked, typed field access.
#[derive(Clone, Copy, Debug)]
pub struct Obj<'a> {
    map: &'a Map<String, Json>,
}

impl<'a> Obj<'a> {
    /// Wraps `value`, failing if it is not a JSON object.
    pub fn wrap(value: &'a Json, what: &'static str) -> Result<Self, LoadError> {
        match value.as_object() {
            Some(map) => Ok(Obj { map }),
            None => Err(LoadError::InvalidFieldType(what)),
        }
    }

    /// A required field of any JSON type.
    pub fn field(&self, key: &'static str) -> Result<&'a Json, LoadError> {
        self.map.get(key).ok_or(LoadError::MissingField(key))
    }

    /// An optional field; JSON `null` counts as absent.
    pub fn opt_field(&self, key: &str) -> Option<&'a Json> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, key: &'static str) -> Result<&'a str, LoadError> {
        self.field(key)?
            .as_str()
            .ok_or(LoadError::InvalidFieldType(key))
    }

    /// An optional string field, defaulting to the empty string.
    pub fn description(&self) -> Result<String, LoadError> {
        match self.opt_field("description") {
            Some(v) => v
                .as_str()
                .map(str::to_owned)
                .ok_or(LoadError::InvalidFieldType("description")),
            None => Ok(String::new()),
        }
    }

    pub fn i32_field(&self, key: &'static str) -> Result<i32, LoadError> {
        self.field(key)?
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or(LoadError::InvalidFieldType(key))
    }

    pub fn f64_field(&self, key: &'static str) -> Result<f64, LoadError> {
        self.field(key)?
            .as_f64()
            .ok_or(LoadError::InvalidFieldType(key))
    }

    pub fn u32_field(&self, key: &'static str) -> Result<u32, LoadError> {
        self.field(key)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(LoadError::InvalidFieldType(key))
    }

    pub fn array_field(&self, key: &'static str) -> Result<&'a [Json], LoadError> {
        self.field(key)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or(LoadError::InvalidFieldType(key))
    }

    /// An optional array field; absent yields an empty slice.
    pub fn opt_array_field(&self, key: &'static str) -> Result<&'a [Json], LoadError> {
        match self.opt_field(key) {
            Some(v) => v
                .as_array()
                .map(Vec::as_slice)
                .ok_or(LoadError::InvalidFieldType(key)),
            None => Ok(&[]),
        }
    }
}

/// Reads an f64 out of a JSON array element, failing with the owning field's
/// name on a non-numeric entry.
pub fn element_f64(value: &Json, key: &'static str) -> Result<f64, LoadError> {
    value.as_f64().ok_or(LoadError::InvalidFieldType(key))
}

/// Reads a string out of a JSON array element.
pub fn element_str<'a>(value: &'a Json, key: &'static str) -> Result<&'a str, LoadError> {
    value.as_str().ok_or(LoadError::InvalidFieldType(key))
}
