//! Path-based field extraction over a loosely-typed JSON payload.
//!
//! Decoders address fields with dotted paths (`state.tempLimit`,
//! `delays.0.on`). Required lookups fail with a [`DecodeError`] naming the
//! record and the full path; optional lookups treat an absent key and an
//! explicit `null` the same way and return `None`.

use serde_json::{Map, Value};

use crate::error::DecodeError;

type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Fields<'a> {
    record: &'static str,
    root: &'a Value,
}

/// A nested view whose error paths are prefixed, e.g. `devices.2`.
#[derive(Debug, Clone)]
pub(crate) struct Scoped<'a> {
    record: &'static str,
    root: &'a Value,
    prefix: String,
}

impl<'a> Fields<'a> {
    pub fn new(record: &'static str, root: &'a Value) -> Self {
        Self { record, root }
    }

    /// Every element of the required array at `path`, each as its own scope.
    pub fn elements(&self, path: &str) -> Result<Vec<Scoped<'a>>> {
        self.scoped().elements(path)
    }

    fn scoped(&self) -> Scoped<'a> {
        Scoped {
            record: self.record,
            root: self.root,
            prefix: String::new(),
        }
    }

    pub fn bool(&self, path: &str) -> Result<bool> {
        self.scoped().bool(path)
    }

    pub fn opt_bool(&self, path: &str) -> Result<Option<bool>> {
        self.scoped().opt_bool(path)
    }

    pub fn i64(&self, path: &str) -> Result<i64> {
        self.scoped().i64(path)
    }

    pub fn opt_i64(&self, path: &str) -> Result<Option<i64>> {
        self.scoped().opt_i64(path)
    }

    pub fn f64(&self, path: &str) -> Result<f64> {
        self.scoped().f64(path)
    }

    pub fn string(&self, path: &str) -> Result<String> {
        self.scoped().string(path)
    }

    pub fn object(&self, path: &str) -> Result<Map<String, Value>> {
        self.scoped().object(path)
    }

    pub fn opt_object(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        self.scoped().opt_object(path)
    }

    pub fn bool_array(&self, path: &str) -> Result<Vec<bool>> {
        self.scoped().bool_array(path)
    }

    pub fn string_array(&self, path: &str) -> Result<Vec<String>> {
        self.scoped().string_array(path)
    }
}

impl<'a> Scoped<'a> {
    fn full_path(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_owned()
        } else {
            format!("{}.{}", self.prefix, path)
        }
    }

    /// Walks `path`; numeric segments index into arrays. `null` counts as absent.
    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let mut current = self.root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }

    fn required(&self, path: &str) -> Result<&'a Value> {
        self.lookup(path).ok_or_else(|| DecodeError::MissingField {
            record: self.record,
            path: self.full_path(path),
        })
    }

    fn invalid(&self, path: &str, expected: &'static str) -> DecodeError {
        DecodeError::InvalidType {
            record: self.record,
            path: self.full_path(path),
            expected,
        }
    }

    fn typed<T>(
        &self,
        path: &str,
        expected: &'static str,
        value: Option<&'a Value>,
        convert: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match value {
            None => Ok(None),
            Some(v) => convert(v).map(Some).ok_or_else(|| self.invalid(path, expected)),
        }
    }

    pub fn elements(&self, path: &str) -> Result<Vec<Scoped<'a>>> {
        let items = self
            .required(path)?
            .as_array()
            .ok_or_else(|| self.invalid(path, "an array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| Scoped {
                record: self.record,
                root: item,
                prefix: self.full_path(&format!("{path}.{i}")),
            })
            .collect())
    }

    pub fn bool(&self, path: &str) -> Result<bool> {
        let v = self.required(path)?;
        v.as_bool().ok_or_else(|| self.invalid(path, "a boolean"))
    }

    pub fn opt_bool(&self, path: &str) -> Result<Option<bool>> {
        self.typed(path, "a boolean", self.lookup(path), Value::as_bool)
    }

    pub fn i64(&self, path: &str) -> Result<i64> {
        let v = self.required(path)?;
        v.as_i64().ok_or_else(|| self.invalid(path, "an integer"))
    }

    pub fn opt_i64(&self, path: &str) -> Result<Option<i64>> {
        self.typed(path, "an integer", self.lookup(path), Value::as_i64)
    }

    /// Any JSON number; integers widen to `f64`.
    pub fn f64(&self, path: &str) -> Result<f64> {
        let v = self.required(path)?;
        v.as_f64().ok_or_else(|| self.invalid(path, "a number"))
    }

    pub fn string(&self, path: &str) -> Result<String> {
        let v = self.required(path)?;
        v.as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.invalid(path, "a string"))
    }

    pub fn object(&self, path: &str) -> Result<Map<String, Value>> {
        let v = self.required(path)?;
        v.as_object()
            .cloned()
            .ok_or_else(|| self.invalid(path, "an object"))
    }

    pub fn opt_object(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        self.typed(path, "an object", self.lookup(path), |v| v.as_object().cloned())
    }

    pub fn bool_array(&self, path: &str) -> Result<Vec<bool>> {
        let v = self.required(path)?;
        v.as_array()
            .and_then(|items| items.iter().map(Value::as_bool).collect())
            .ok_or_else(|| self.invalid(path, "an array of booleans"))
    }

    pub fn string_array(&self, path: &str) -> Result<Vec<String>> {
        let v = self.required(path)?;
        v.as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_owned))
                    .collect()
            })
            .ok_or_else(|| self.invalid(path, "an array of strings"))
    }
}
