//! The keyed container of corrections and compound corrections, with the
//! document entry points.
//!
//! Loading parses the JSON (transparently gunzipping files that start with
//! the gzip magic), checks the schema version against the evaluator's
//! compiled-in version, and eagerly builds and validates every correction.
//! The resulting set is deeply immutable and freely shareable across
//! threads.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use log::debug;
use rustc_hash::FxHashMap;

use crate::engine::compound::CompoundCorrection;
use crate::engine::correction::Correction;
use crate::engine::errors::{EvalError, LoadError};
use crate::frontend::json::Obj;
use serde_json::Value as Json;

/// The document schema version this evaluator is compiled for.
pub const EVALUATOR_VERSION: i32 = 2;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A loaded correction document.
#[derive(Debug)]
pub struct CorrectionSet {
    schema_version: i32,
    description: String,
    corrections: FxHashMap<String, Arc<Correction>>,
    compound: FxHashMap<String, Arc<CompoundCorrection>>,
}

impl CorrectionSet {
    /// Loads a correction set from a JSON file, transparently decompressing
    /// gzip content.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)?;
        let bytes = if bytes.starts_with(&GZIP_MAGIC) {
            let mut decompressed = Vec::new();
            GzDecoder::new(bytes.as_slice()).read_to_end(&mut decompressed)?;
            decompressed
        } else {
            bytes
        };
        let root: Json =
            serde_json::from_slice(&bytes).map_err(|e| LoadError::ParseJson(e.to_string()))?;
        Self::from_json(&root)
    }

    /// Loads a correction set from an in-memory JSON string.
    pub fn from_string(data: &str) -> Result<Self, LoadError> {
        let root: Json =
            serde_json::from_str(data).map_err(|e| LoadError::ParseJson(e.to_string()))?;
        Self::from_json(&root)
    }

    fn from_json(root: &Json) -> Result<Self, LoadError> {
        let obj = Obj::wrap(root, "correction set")?;
        let schema_version = obj.i32_field("schema_version")?;
        if schema_version != EVALUATOR_VERSION {
            return Err(LoadError::SchemaMismatch {
                found: schema_version,
                supported: EVALUATOR_VERSION,
                direction: if schema_version > EVALUATOR_VERSION {
                    "forward"
                } else {
                    "backward"
                },
            });
        }
        let description = obj.description()?;

        let mut corrections = FxHashMap::default();
        for item in obj.array_field("corrections")? {
            let corr = Arc::new(Correction::from_json(item)?);
            let name = corr.name().to_owned();
            if corrections.insert(name.clone(), corr).is_some() {
                return Err(LoadError::DuplicateName(name));
            }
        }

        let mut compound = FxHashMap::default();
        for item in obj.opt_array_field("compound_corrections")? {
            let comp = Arc::new(CompoundCorrection::from_json(item, &corrections)?);
            let name = comp.name().to_owned();
            if compound.insert(name.clone(), comp).is_some() {
                return Err(LoadError::DuplicateName(name));
            }
        }

        debug!(
            "loaded correction set: {} corrections, {} compound corrections",
            corrections.len(),
            compound.len()
        );
        Ok(CorrectionSet {
            schema_version,
            description,
            corrections,
            compound,
        })
    }

    pub fn schema_version(&self) -> i32 {
        self.schema_version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Looks up a correction by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Correction>> {
        self.corrections.get(name)
    }

    /// Looks up a correction by name, failing with `KeyNotFound`.
    pub fn at(&self, name: &str) -> Result<&Arc<Correction>, EvalError> {
        self.corrections.get(name).ok_or_else(|| EvalError::KeyNotFound {
            node: "correction set",
            key: name.to_owned(),
        })
    }

    /// Iterates over `(name, correction)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Correction>)> {
        self.corrections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Correction names, in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.corrections.keys().map(String::as_str)
    }

    /// The compound corrections, keyed by name.
    pub fn compound(&self) -> &FxHashMap<String, Arc<CompoundCorrection>> {
        &self.compound
    }
}
