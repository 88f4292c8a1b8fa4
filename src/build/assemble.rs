//! Combining per-method outputs into assays, metadata and ground truth.

use crate::build::engine::TruthColumns;
use crate::build::provenance::Provenance;
use crate::data::{Dataset, ResultMatrix, Table, Value};
use crate::design::{Arg, BenchDesign, MethodSpec};
use crate::error::{BenchError, Result};
use crate::result::BenchmarkResult;

/// Post-processed outputs of one method, or the reason it failed.
pub(crate) struct MethodOutcome {
    pub outputs: std::result::Result<Vec<(String, Value)>, String>,
}

/// Assay names produced by a design, in first-seen order.
pub(crate) fn assay_names(design: &BenchDesign, default_assay: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for spec in design.methods() {
        for name in spec.post_process().output_names(default_assay) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Resolve the truth configuration into `(assay, field)` pairs.
pub(crate) fn truth_mapping(truth: &TruthColumns, assays: &[String]) -> Result<Vec<(String, String)>> {
    match truth {
        TruthColumns::None => Ok(Vec::new()),
        TruthColumns::Single(column) => {
            if assays.len() != 1 {
                return Err(BenchError::Configuration(format!(
                    "a single truth column '{}' was given but the design produces {} assays ({}); \
                     map each assay to its own truth column",
                    column,
                    assays.len(),
                    assays.join(", ")
                )));
            }
            Ok(vec![(assays[0].clone(), column.clone())])
        }
        TruthColumns::PerAssay(map) => {
            if let Some(unknown) = map.keys().find(|k| !assays.contains(k)) {
                return Err(BenchError::Configuration(format!(
                    "truth mapping names assay '{}' which the design does not produce",
                    unknown
                )));
            }
            Ok(assays
                .iter()
                .filter_map(|a| map.get(a).map(|c| (a.clone(), c.clone())))
                .collect())
        }
    }
}

/// Assemble the result of a build.
pub(crate) fn assemble(
    design: &BenchDesign,
    outcomes: &[MethodOutcome],
    provenance: &[Provenance],
    assays: &[String],
    truth: &[(String, String)],
) -> Result<BenchmarkResult> {
    let labels: Vec<String> = design.labels().into_iter().map(str::to_string).collect();

    let numeric = design
        .methods()
        .iter()
        .zip(outcomes)
        .map(|(spec, outcome)| numeric_outputs(spec, outcome))
        .collect::<Result<Vec<_>>>()?;

    // The first successful output fixes the row count.
    let reference = design
        .methods()
        .iter()
        .zip(&numeric)
        .find_map(|(spec, outs)| {
            outs.as_ref()
                .and_then(|o| o.first())
                .map(|(_, v)| (spec.label(), v.len()))
        });
    let n_rows = match reference {
        Some((_, n)) => n,
        None => rows_without_outputs(design, truth),
    };

    if let Some((ref_label, _)) = reference {
        for (spec, outs) in design.methods().iter().zip(&numeric) {
            for (name, values) in outs.iter().flatten() {
                if values.len() != n_rows {
                    return Err(BenchError::Assembly {
                        method: spec.label().to_string(),
                        reason: format!(
                            "output '{}' has length {} but method '{}' returned {}",
                            name,
                            values.len(),
                            ref_label,
                            n_rows
                        ),
                    });
                }
            }
        }
    }

    let row_ids: Vec<String> = match design.dataset().row_ids() {
        Some(ids) if ids.len() == n_rows => ids.to_vec(),
        _ => (1..=n_rows).map(|i| i.to_string()).collect(),
    };

    let matrices = assays
        .iter()
        .map(|assay| {
            let columns: Vec<Vec<f64>> = numeric
                .iter()
                .map(|outs| {
                    outs.as_ref()
                        .and_then(|o| o.iter().find(|(name, _)| name == assay))
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![f64::NAN; n_rows])
                })
                .collect();
            ResultMatrix::from_columns(row_ids.clone(), labels.clone(), &columns)
                .map(|m| (assay.clone(), m))
        })
        .collect::<Result<Vec<_>>>()?;

    let metadata = method_metadata(design, outcomes, provenance)?;
    let ground_truth = ground_truth(design.dataset(), truth, &row_ids)?;

    BenchmarkResult::new(matrices, metadata, ground_truth)
}

/// Row count when no method produced output: table rows, then the mapped
/// truth field, then the first vector-valued field argument.
fn rows_without_outputs(design: &BenchDesign, truth: &[(String, String)]) -> usize {
    let dataset = design.dataset();
    if let Some(ids) = dataset.row_ids() {
        return ids.len();
    }
    let from_truth = truth
        .iter()
        .filter_map(|(_, column)| dataset.field(column))
        .map(|value| truth_cells(&value).len())
        .find(|&n| n > 0);
    if let Some(n) = from_truth {
        return n;
    }
    design
        .methods()
        .iter()
        .flat_map(|spec| spec.args())
        .filter_map(|(_, arg)| match arg {
            Arg::Field(name) => dataset.field(name),
            Arg::Literal(_) => None,
        })
        .filter(|value| !matches!(value, Value::Number(_) | Value::Bool(_)))
        .filter_map(|value| value.to_numeric_vec().map(|v| v.len()))
        .find(|&n| n > 0)
        .unwrap_or(0)
}

fn numeric_outputs(
    spec: &MethodSpec,
    outcome: &MethodOutcome,
) -> Result<Option<Vec<(String, Vec<f64>)>>> {
    let outputs = match &outcome.outputs {
        Ok(outputs) => outputs,
        Err(_) => return Ok(None),
    };
    outputs
        .iter()
        .map(|(name, value)| {
            value
                .to_numeric_vec()
                .map(|v| (name.clone(), v))
                .ok_or_else(|| BenchError::Assembly {
                    method: spec.label().to_string(),
                    reason: format!("output '{}' is {}, not a numeric vector", name, value.kind()),
                })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// One row per method: identity, provenance, failure note, then parameter
/// and free-form metadata columns.
fn method_metadata(
    design: &BenchDesign,
    outcomes: &[MethodOutcome],
    provenance: &[Provenance],
) -> Result<Table> {
    let methods = design.methods();
    let labels: Vec<String> = design.labels().into_iter().map(str::to_string).collect();
    let mut table = Table::new(labels.clone());

    let text = |s: Option<&str>| s.map_or(Value::Missing, Value::from);

    table.set_column("label", labels.iter().map(|l| Value::from(l.as_str())).collect())?;
    table.set_column(
        "func",
        methods.iter().map(|m| Value::from(m.func().name())).collect(),
    )?;
    table.set_column(
        "post",
        methods
            .iter()
            .map(|m| Value::from(m.post_process().describe()))
            .collect(),
    )?;
    table.set_column(
        "pkg_name",
        provenance.iter().map(|p| text(p.pkg_name.as_deref())).collect(),
    )?;
    table.set_column(
        "pkg_vers",
        provenance.iter().map(|p| text(p.pkg_vers.as_deref())).collect(),
    )?;
    table.set_column(
        "vers_src",
        provenance.iter().map(|p| Value::from(p.source.code())).collect(),
    )?;
    table.set_column(
        "error",
        outcomes
            .iter()
            .map(|o| text(o.outputs.as_ref().err().map(String::as_str)))
            .collect(),
    )?;

    let mut params: Vec<&str> = Vec::new();
    let mut keys: Vec<&str> = Vec::new();
    for spec in methods {
        for (name, _) in spec.args() {
            if !params.contains(&name.as_str()) {
                params.push(name);
            }
        }
        for (key, _) in spec.method_meta().extra() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
    }

    for param in params {
        let cells = methods
            .iter()
            .map(|m| m.get_arg(param).map_or(Value::Missing, |a| Value::Text(a.to_string())))
            .collect();
        table.set_column(&format!("param.{}", param), cells)?;
    }
    for key in keys {
        let cells = methods
            .iter()
            .map(|m| {
                m.method_meta()
                    .extra()
                    .iter()
                    .find(|(k, _)| k == key)
                    .map_or(Value::Missing, |(_, v)| v.clone())
            })
            .collect();
        table.set_column(&format!("meta.{}", key), cells)?;
    }

    Ok(table)
}

fn ground_truth(
    dataset: &Dataset,
    truth: &[(String, String)],
    row_ids: &[String],
) -> Result<Option<Table>> {
    if truth.is_empty() {
        return Ok(None);
    }
    let mut table = Table::new(row_ids.to_vec());
    for (assay, column) in truth {
        let value = dataset
            .field(column)
            .ok_or_else(|| BenchError::NotFound(format!("ground truth column '{}'", column)))?;
        let cells = truth_cells(&value);
        if cells.len() != row_ids.len() {
            return Err(BenchError::Assembly {
                method: format!("truth:{}", column),
                reason: format!(
                    "ground truth has length {} but assays have {} rows",
                    cells.len(),
                    row_ids.len()
                ),
            });
        }
        table.set_column(assay, cells)?;
    }
    Ok(Some(table))
}

fn truth_cells(value: &Value) -> Vec<Value> {
    let cell = |v: f64| if v.is_nan() { Value::Missing } else { Value::Number(v) };
    match value {
        Value::Numeric(values) => values.iter().map(|&v| cell(v)).collect(),
        Value::Strings(values) => values.iter().map(|s| Value::from(s.as_str())).collect(),
        Value::List(items) => items.clone(),
        Value::Record(fields) => fields.iter().map(|(_, v)| v.clone()).collect(),
        Value::Missing => Vec::new(),
        Value::Number(v) => vec![cell(*v)],
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build, BuildConfig, DEFAULT_ASSAY};
    use crate::design::{MethodFn, MethodMeta, Transform};
    use std::collections::BTreeMap;

    fn table_dataset() -> Table {
        Table::from_rows(
            vec!["g1".into(), "g2".into(), "g3".into()],
            vec!["p".into(), "status".into()],
            vec![
                vec![Value::Number(0.01), Value::Number(1.0)],
                vec![Value::Number(0.5), Value::Missing],
                vec![Value::Number(0.03), Value::Number(0.0)],
            ],
        )
        .unwrap()
    }

    fn identity() -> MethodFn {
        MethodFn::new("identity", |args| Ok(args.require("x")?.clone())).in_package("base")
    }

    #[test]
    fn test_assay_names_union_in_order() {
        let id = Transform::new("id", |v| Ok(v.clone()));
        let mut bd = BenchDesign::new(table_dataset());
        bd.add_method(
            MethodSpec::new("a", identity())
                .arg("x", Arg::field("p"))
                .post_named(vec![("pv", id.clone())]),
        )
        .unwrap();
        bd.add_method(
            MethodSpec::new("b", identity())
                .arg("x", Arg::field("p"))
                .post_named(vec![("adj", id.clone()), ("pv", id)]),
        )
        .unwrap();
        assert_eq!(assay_names(&bd, DEFAULT_ASSAY), vec!["pv", "adj"]);

        let result = build(&bd, &BuildConfig::new()).unwrap();
        let adj = result.assay("adj").unwrap();
        assert!(adj.column("a").unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(adj.column("b").unwrap(), vec![0.01, 0.5, 0.03]);
    }

    #[test]
    fn test_truth_mapping_unknown_assay() {
        let mut map = BTreeMap::new();
        map.insert("other".to_string(), "status".to_string());
        let err = truth_mapping(&TruthColumns::PerAssay(map), &["default".to_string()]).unwrap_err();
        assert!(matches!(err, BenchError::Configuration(_)));
    }

    #[test]
    fn test_row_ids_and_truth_from_table() {
        let mut bd = BenchDesign::new(table_dataset());
        bd.add_method(MethodSpec::new("a", identity()).arg("x", Arg::field("p")))
            .unwrap();
        let result = build(&bd, &BuildConfig::new().truth_column("status")).unwrap();
        assert_eq!(result.row_ids(), &["g1", "g2", "g3"]);

        let truth = result.truth_for(DEFAULT_ASSAY).unwrap();
        assert_eq!(truth[0], 1.0);
        assert!(truth[1].is_nan());
        assert_eq!(truth[2], 0.0);
    }

    #[test]
    fn test_fallback_row_ids() {
        let mut bd = BenchDesign::new(table_dataset());
        let two = MethodFn::new("two", |_| Ok(Value::Numeric(vec![0.1, 0.2])));
        bd.add_method(MethodSpec::new("a", two)).unwrap();
        let result = build(&bd, &BuildConfig::new()).unwrap();
        assert_eq!(result.row_ids(), &["1", "2"]);
    }

    #[test]
    fn test_metadata_columns() {
        let mut bd = BenchDesign::new(table_dataset());
        bd.add_method(
            MethodSpec::new("a", identity())
                .arg("x", Arg::field("p"))
                .arg("method", Arg::literal("BH"))
                .meta(MethodMeta::new().with("family", "adjust").unwrap()),
        )
        .unwrap();
        bd.add_method(MethodSpec::new("b", identity()).arg("x", Arg::field("p")))
            .unwrap();
        let result = build(&bd, &BuildConfig::new()).unwrap();
        let meta = result.method_metadata();

        assert_eq!(meta.row_ids(), &["a", "b"]);
        assert_eq!(meta.get(0, "func").unwrap().as_text(), Some("identity"));
        assert_eq!(meta.get(0, "pkg_name").unwrap().as_text(), Some("base"));
        assert!(meta.get(0, "pkg_vers").unwrap().is_missing());
        assert_eq!(meta.get(0, "vers_src").unwrap().as_text(), Some("bfunc"));
        assert_eq!(meta.get(0, "param.x").unwrap().as_text(), Some("p"));
        assert_eq!(meta.get(0, "param.method").unwrap().as_text(), Some("\"BH\""));
        assert!(meta.get(1, "param.method").unwrap().is_missing());
        assert_eq!(meta.get(0, "meta.family").unwrap().as_text(), Some("adjust"));
        assert!(meta.get(1, "meta.family").unwrap().is_missing());
    }

    #[test]
    fn test_non_numeric_output() {
        let mut bd = BenchDesign::new(table_dataset());
        let text = MethodFn::new("text", |_| Ok(Value::from("oops")));
        bd.add_method(MethodSpec::new("a", text)).unwrap();
        let err = build(&bd, &BuildConfig::new()).unwrap_err();
        assert!(matches!(err, BenchError::Assembly { method, .. } if method == "a"));
    }

    #[test]
    fn test_all_methods_fail() {
        let mut bd = BenchDesign::new(table_dataset());
        let fail = MethodFn::new("fail", |_| {
            Err(crate::error::MethodError::Failed("no".into()))
        });
        bd.add_method(MethodSpec::new("a", fail)).unwrap();
        let result = build(&bd, &BuildConfig::new()).unwrap();
        let assay = result.assay(DEFAULT_ASSAY).unwrap();
        assert_eq!(assay.n_rows(), 3);
        assert!(assay.column("a").unwrap().iter().all(|v| v.is_nan()));
    }

    fn failing() -> MethodFn {
        MethodFn::new("fail", |_| Err(crate::error::MethodError::Failed("no".into())))
    }

    fn field_dataset() -> Dataset {
        Dataset::from_fields(vec![
            ("p".into(), Value::Numeric(vec![0.01, 0.5, 0.03])),
            ("label".into(), Value::Numeric(vec![1.0, 0.0, 1.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_all_methods_fail_on_fields_with_truth() {
        let mut bd = BenchDesign::new(field_dataset());
        bd.add_method(MethodSpec::new("a", failing()).arg("x", Arg::field("p")))
            .unwrap();
        bd.add_method(MethodSpec::new("b", failing())).unwrap();

        let result = build(&bd, &BuildConfig::new().truth_column("label")).unwrap();
        assert_eq!(result.n_rows(), 3);
        assert_eq!(result.row_ids(), &["1", "2", "3"]);
        let assay = result.assay(DEFAULT_ASSAY).unwrap();
        assert!(assay.column("a").unwrap().iter().all(|v| v.is_nan()));
        assert!(assay.column("b").unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(result.truth_for(DEFAULT_ASSAY).unwrap(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_all_methods_fail_on_fields_without_truth() {
        let mut bd = BenchDesign::new(field_dataset());
        bd.add_method(MethodSpec::new("a", failing()).arg("x", Arg::field("p")))
            .unwrap();
        let result = build(&bd, &BuildConfig::new()).unwrap();
        let assay = result.assay(DEFAULT_ASSAY).unwrap();
        assert_eq!(assay.n_rows(), 3);
        assert!(assay.column("a").unwrap().iter().all(|v| v.is_nan()));
    }
}
