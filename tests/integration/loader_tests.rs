//! Loader behavior: file entry points, gzip sniffing, and the load-time
//! validation taxonomy over complete documents.

use std::io::Write;

use correval::{CorrectionSet, LoadError, Value};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

fn doc_with_data(data: serde_json::Value) -> String {
    json!({
        "schema_version": 2,
        "corrections": [{
            "name": "test",
            "version": 1,
            "inputs": [
                {"name": "x", "type": "real"},
                {"name": "n", "type": "int"},
                {"name": "s", "type": "string"},
            ],
            "output": {"name": "weight", "type": "real"},
            "data": data,
        }],
    })
    .to_string()
}

#[test]
fn from_file_reads_plain_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cset.json");
    std::fs::write(&path, doc_with_data(json!(2.5))).unwrap();

    let cset = CorrectionSet::from_file(&path).expect("load");
    let corr = cset.at("test").unwrap();
    let values = [Value::Real(1.0), Value::Int(0), Value::Str("a".into())];
    assert_eq!(corr.evaluate(&values).unwrap(), 2.5);
}

#[test]
fn from_file_transparently_gunzips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cset.json.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(doc_with_data(json!(2.5)).as_bytes())
        .unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();

    let cset = CorrectionSet::from_file(&path).expect("load");
    let corr = cset.at("test").unwrap();
    let values = [Value::Real(1.0), Value::Int(0), Value::Str("a".into())];
    assert_eq!(corr.evaluate(&values).unwrap(), 2.5);
}

#[test]
fn from_file_missing_path_is_io_error() {
    let err = CorrectionSet::from_file("/nonexistent/cset.json").unwrap_err();
    assert!(matches!(err, LoadError::Io(_)));
}

#[test]
fn unknown_nodetype_fails() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "spline",
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::UnknownNodeType(t) if t == "spline"));
}

#[test]
fn missing_fields_are_named() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "binning",
        "input": "x",
        "content": [],
        "flow": "clamp",
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::MissingField("edges")));
}

#[test]
fn unknown_axis_variable_fails() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "binning",
        "input": "pt",
        "edges": [0.0, 1.0],
        "content": [1.0],
        "flow": "clamp",
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::UnknownVariable(v) if v == "pt"));
}

#[test]
fn string_axis_input_fails() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "binning",
        "input": "s",
        "edges": [0.0, 1.0],
        "content": [1.0],
        "flow": "clamp",
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::TypeDisallowed(_)));
}

#[test]
fn non_monotone_edges_fail() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "binning",
        "input": "x",
        "edges": [0.0, 2.0, 1.0],
        "content": [1.0, 2.0],
        "flow": "clamp",
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::NonMonotoneEdges));
}

#[test]
fn content_size_mismatch_fails() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "multibinning",
        "inputs": ["x", "n"],
        "edges": [[0.0, 1.0, 2.0], [0.0, 1.0]],
        "content": [1.0, 2.0, 3.0],
        "flow": "clamp",
    })))
    .unwrap_err();
    assert!(matches!(
        err,
        LoadError::InconsistentContentSize { expected: 2, found: 3 }
    ));
}

#[test]
fn bad_formula_fails_with_position() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "formula",
        "parser": "TFormula",
        "expression": "2*(x",
        "variables": ["x"],
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::BadFormula { .. }));
}

#[test]
fn numexpr_fails_as_unknown_parser() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "formula",
        "parser": "numexpr",
        "expression": "x + 1",
        "variables": ["x"],
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::UnknownParser(p) if p == "numexpr"));
}

#[test]
fn formula_over_undeclared_position_fails() {
    let err = CorrectionSet::from_string(&doc_with_data(json!({
        "nodetype": "formula",
        "parser": "TFormula",
        "expression": "x + y",
        "variables": ["x"],
    })))
    .unwrap_err();
    assert!(matches!(err, LoadError::InsufficientVariables(v) if v == "y"));
}

#[test]
fn formularef_out_of_range_index_fails() {
    let doc = json!({
        "schema_version": 2,
        "corrections": [{
            "name": "test",
            "version": 1,
            "inputs": [{"name": "x", "type": "real"}],
            "output": {"name": "weight", "type": "real"},
            "generic_formulas": [{
                "nodetype": "formula",
                "parser": "TFormula",
                "expression": "[0]*x",
                "variables": ["x"],
            }],
            "data": {"nodetype": "formularef", "index": 5, "parameters": [1.0]},
        }],
    });
    let err = CorrectionSet::from_string(&doc.to_string()).unwrap_err();
    assert!(matches!(err, LoadError::InvalidFieldType("index")));
}

#[test]
fn formularef_with_too_few_parameters_fails() {
    let doc = json!({
        "schema_version": 2,
        "corrections": [{
            "name": "test",
            "version": 1,
            "inputs": [{"name": "x", "type": "real"}],
            "output": {"name": "weight", "type": "real"},
            "generic_formulas": [{
                "nodetype": "formula",
                "parser": "TFormula",
                "expression": "[0] + [1]*x",
                "variables": ["x"],
            }],
            "data": {"nodetype": "formularef", "index": 0, "parameters": [1.0]},
        }],
    });
    let err = CorrectionSet::from_string(&doc.to_string()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::InsufficientParameters { index: 1, count: 1 }
    ));
}

#[test]
fn duplicate_compound_names_fail() {
    let compound = json!({
        "name": "twin",
        "output": {"name": "sf", "type": "real"},
        "inputs": [],
        "inputs_update": [],
        "input_op": "*",
        "output_op": "*",
        "stack": ["flat"],
    });
    let doc = json!({
        "schema_version": 2,
        "corrections": [{
            "name": "flat",
            "version": 1,
            "inputs": [],
            "output": {"name": "sf", "type": "real"},
            "data": 1.0,
        }],
        "compound_corrections": [compound.clone(), compound],
    });
    let err = CorrectionSet::from_string(&doc.to_string()).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateName(n) if n == "twin"));
}
