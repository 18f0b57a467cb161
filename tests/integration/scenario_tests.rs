//! End-to-end scenarios over complete documents.

use correval::{CorrectionSet, EvalError, Value};
use serde_json::json;

fn single(correction: serde_json::Value) -> CorrectionSet {
    let doc = json!({
        "schema_version": 2,
        "corrections": [correction],
    });
    CorrectionSet::from_string(&doc.to_string()).expect("load")
}

#[test]
fn nonuniform_binning_with_clamp() {
    let cset = single(json!({
        "name": "ptweight",
        "version": 1,
        "inputs": [{"name": "x", "type": "real"}],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "binning",
            "input": "x",
            "flow": "clamp",
            "edges": [0.0, 1.0, 2.0, 3.0],
            "content": [10.0, 20.0, 30.0],
        },
    }));
    let corr = cset.at("ptweight").unwrap();
    assert_eq!(corr.evaluate(&[Value::Real(0.5)]).unwrap(), 10.0);
    assert_eq!(corr.evaluate(&[Value::Real(2.999)]).unwrap(), 30.0);
    assert_eq!(corr.evaluate(&[Value::Real(-1.0)]).unwrap(), 10.0);
    assert_eq!(corr.evaluate(&[Value::Real(5.0)]).unwrap(), 30.0);
}

#[test]
fn uniform_multibinning_with_default_node() {
    let cset = single(json!({
        "name": "grid",
        "version": 1,
        "inputs": [
            {"name": "x", "type": "real"},
            {"name": "y", "type": "real"},
        ],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "multibinning",
            "inputs": ["x", "y"],
            "edges": [
                {"n": 2, "low": 0.0, "high": 2.0},
                {"n": 2, "low": 0.0, "high": 2.0},
            ],
            "content": [1.0, 2.0, 3.0, 4.0],
            "flow": 99.0,
        },
    }));
    let corr = cset.at("grid").unwrap();
    let at = |x: f64, y: f64| corr.evaluate(&[Value::Real(x), Value::Real(y)]).unwrap();
    assert_eq!(at(0.5, 0.5), 1.0);
    assert_eq!(at(1.5, 0.5), 3.0);
    assert_eq!(at(1.5, 1.5), 4.0);
    assert_eq!(at(2.1, 0.5), 99.0);
}

#[test]
fn category_with_default() {
    let cset = single(json!({
        "name": "syst",
        "version": 1,
        "inputs": [{"name": "flag", "type": "string"}],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "category",
            "input": "flag",
            "content": [
                {"key": "up", "value": 1.1},
                {"key": "down", "value": 0.9},
            ],
            "default": 1.0,
        },
    }));
    let corr = cset.at("syst").unwrap();
    assert_eq!(corr.evaluate(&[Value::Str("up".into())]).unwrap(), 1.1);
    assert_eq!(corr.evaluate(&[Value::Str("sideways".into())]).unwrap(), 1.0);
}

#[test]
fn tformula_with_parameters_and_comparison() {
    let cset = single(json!({
        "name": "poly",
        "version": 1,
        "inputs": [
            {"name": "a", "type": "real"},
            {"name": "b", "type": "real"},
        ],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "formula",
            "parser": "TFormula",
            "expression": "2.0*x + [0]*y^2",
            "parameters": [3.0],
            "variables": ["a", "b"],
        },
    }));
    let corr = cset.at("poly").unwrap();
    assert_eq!(
        corr.evaluate(&[Value::Real(1.0), Value::Real(2.0)]).unwrap(),
        14.0
    );

    let cset = single(json!({
        "name": "step",
        "version": 1,
        "inputs": [{"name": "a", "type": "real"}],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "formula",
            "parser": "TFormula",
            "expression": "x>1",
            "variables": ["a"],
        },
    }));
    let corr = cset.at("step").unwrap();
    assert_eq!(corr.evaluate(&[Value::Real(2.0)]).unwrap(), 1.0);
    assert_eq!(corr.evaluate(&[Value::Real(0.0)]).unwrap(), 0.0);
}

#[test]
fn transform_rounds_integer_input() {
    let cset = single(json!({
        "name": "shifted",
        "version": 1,
        "inputs": [
            {"name": "n", "type": "int"},
            {"name": "v", "type": "real"},
        ],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "transform",
            "input": "n",
            "rule": {
                "nodetype": "formula",
                "parser": "TFormula",
                "expression": "x+0.7",
                "variables": ["v"],
            },
            "content": {
                "nodetype": "category",
                "input": "n",
                "content": [
                    {"key": 3, "value": 100.0},
                    {"key": 4, "value": 200.0},
                ],
            },
        },
    }));
    let corr = cset.at("shifted").unwrap();
    // rule(2.5) = 3.2 rounds to 3
    assert_eq!(
        corr.evaluate(&[Value::Int(3), Value::Real(2.5)]).unwrap(),
        100.0
    );
    // rule(3.6) = 4.3 rounds to 4
    assert_eq!(
        corr.evaluate(&[Value::Int(3), Value::Real(3.6)]).unwrap(),
        200.0
    );
}

#[test]
fn compound_pipeline_updates_inputs() {
    let doc = json!({
        "schema_version": 2,
        "corrections": [
            {
                "name": "level1",
                "version": 1,
                "inputs": [],
                "output": {"name": "l1sf", "type": "real"},
                "data": 1.1,
            },
            {
                "name": "level2",
                "version": 1,
                "inputs": [
                    {"name": "pt", "type": "real"},
                    {"name": "eta", "type": "real"},
                ],
                "output": {"name": "l2sf", "type": "real"},
                "data": {
                    "nodetype": "formula",
                    "parser": "TFormula",
                    "variables": ["pt", "eta"],
                    "expression": "1 + 0.1*log10(x) + 0.1*y",
                },
            },
        ],
        "compound_corrections": [{
            "name": "l1l2",
            "output": {"name": "sf", "type": "real"},
            "inputs": [
                {"name": "pt", "type": "real"},
                {"name": "eta", "type": "real"},
            ],
            "inputs_update": ["pt"],
            "input_op": "*",
            "output_op": "last",
            "stack": ["level1", "level2"],
        }],
    });
    let cset = CorrectionSet::from_string(&doc.to_string()).expect("load");
    let compound = &cset.compound()["l1l2"];
    let values = vec![Value::Real(10.0), Value::Real(1.2)];
    let out = compound.evaluate(&values).unwrap();
    assert_eq!(out, 1.0 + 0.1 * (10.0f64 * 1.1).log10() + 0.1 * 1.2);
    // The caller's tuple is untouched by the in-place pipeline updates.
    assert_eq!(values[0], Value::Real(10.0));
}

#[test]
fn deep_nesting_composes() {
    // binning -> category -> formula, exercising recursion through
    // heterogeneous node kinds.
    let cset = single(json!({
        "name": "nested",
        "version": 1,
        "inputs": [
            {"name": "pt", "type": "real"},
            {"name": "region", "type": "string"},
        ],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "binning",
            "input": "pt",
            "edges": [0.0, 50.0, "inf"],
            "flow": "error",
            "content": [
                {
                    "nodetype": "category",
                    "input": "region",
                    "content": [
                        {"key": "barrel", "value": {
                            "nodetype": "formula",
                            "parser": "TFormula",
                            "expression": "0.01*x",
                            "variables": ["pt"],
                        }},
                        {"key": "endcap", "value": 0.5},
                    ],
                },
                1.0,
            ],
        },
    }));
    let corr = cset.at("nested").unwrap();
    let at = |pt: f64, region: &str| {
        corr.evaluate(&[Value::Real(pt), Value::Str(region.into())])
            .unwrap()
    };
    assert_eq!(at(30.0, "barrel"), 0.3);
    assert_eq!(at(30.0, "endcap"), 0.5);
    assert_eq!(at(1e6, "barrel"), 1.0);

    let err = corr
        .evaluate(&[Value::Real(-1.0), Value::Str("barrel".into())])
        .unwrap_err();
    assert!(matches!(err, EvalError::OutOfBounds { .. }));
}

#[test]
fn shared_corrections_evaluate_across_threads() {
    let cset = single(json!({
        "name": "flat",
        "version": 1,
        "inputs": [{"name": "x", "type": "real"}],
        "output": {"name": "weight", "type": "real"},
        "data": {
            "nodetype": "binning",
            "input": "x",
            "edges": [0.0, 1.0, 2.0],
            "content": [1.0, 2.0],
            "flow": "clamp",
        },
    }));
    let cset = std::sync::Arc::new(cset);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cset = std::sync::Arc::clone(&cset);
            std::thread::spawn(move || {
                let corr = cset.at("flat").unwrap();
                let v = f64::from(i) * 0.5;
                corr.evaluate(&[Value::Real(v)]).unwrap()
            })
        })
        .collect();
    let results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![1.0, 1.0, 2.0, 2.0]);
}
