//! Integration tests for designing, building and evaluating a benchmark.

use approx::assert_relative_eq;
use std::io::Write;
use summarized_bench::prelude::*;
use tempfile::NamedTempFile;

/// 50 p-values with binary truth; every third case is a true positive and
/// gets a small p-value.
fn create_synthetic_cases() -> (Vec<f64>, Vec<f64>) {
    let mut seed = 42u64;
    let mut rand = || {
        seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
        ((seed >> 16) & 0x7FFF) as f64 / 32768.0
    };

    let mut p = Vec::with_capacity(50);
    let mut label = Vec::with_capacity(50);
    for i in 0..50 {
        let positive = i % 3 == 0;
        let u = rand();
        p.push(if positive { u * 0.15 } else { u });
        label.push(if positive { 1.0 } else { 0.0 });
    }
    (p, label)
}

fn dataset() -> Dataset {
    let (p, label) = create_synthetic_cases();
    Dataset::from_fields(vec![
        ("p".into(), Value::Numeric(p)),
        ("label".into(), Value::Numeric(label)),
    ])
    .unwrap()
}

fn identity() -> MethodFn {
    MethodFn::new("identity", |args| Ok(args.require("x")?.clone()))
}

fn halve() -> MethodFn {
    MethodFn::new("halve", |args| {
        Ok(Value::Numeric(args.numeric("x")?.iter().map(|v| v / 2.0).collect()))
    })
}

fn two_method_design() -> BenchDesign {
    let mut design = BenchDesign::new(dataset());
    design
        .add_method(MethodSpec::new("m1", identity()).arg("x", Arg::field("p")))
        .unwrap();
    design
        .add_method(MethodSpec::new("m2", halve()).arg("x", Arg::field("p")))
        .unwrap();
    design
}

fn many_method_design() -> BenchDesign {
    let mut design = two_method_design();
    let scale = MethodFn::new("scale", |args| {
        let k = args.number_or("k", 1.0)?;
        Ok(Value::Numeric(args.numeric("x")?.iter().map(|v| v * k).collect()))
    });
    design
        .add_method(MethodSpec::new("s", scale).arg("x", Arg::field("p")))
        .unwrap();
    design
        .expand_method_param(
            "s",
            "k",
            vec![
                ("s2".into(), Arg::literal(2.0)),
                ("s3".into(), Arg::literal(3.0)),
                ("s4".into(), Arg::literal(4.0)),
            ],
            false,
        )
        .unwrap();
    let broken = MethodFn::new("broken", |_| {
        Err(MethodError::Failed("model did not converge".into()))
    });
    design.add_method(MethodSpec::new("broken", broken)).unwrap();
    design
}

#[test]
fn test_end_to_end_fifty_cases() {
    let (p, _) = create_synthetic_cases();
    let design = two_method_design();
    let mut result = build(&design, &BuildConfig::new().truth_column("label")).unwrap();

    let assay = result.assay(DEFAULT_ASSAY).unwrap();
    assert_eq!(assay.n_rows(), 50);
    assert_eq!(assay.col_ids(), &["m1", "m2"]);
    let m1 = assay.column("m1").unwrap();
    let m2 = assay.column("m2").unwrap();
    for i in 0..50 {
        assert_relative_eq!(m1[i], p[i]);
        assert_relative_eq!(m2[i], p[i] / 2.0);
    }

    add_default_metrics(&mut result, DEFAULT_ASSAY, &["rejections"]).unwrap();
    let grid = ParamGrid::new().with("alpha", vec![0.1]);
    let records = match evaluate(&mut result, &grid, &EvalOptions::new().tidy(true)).unwrap() {
        Evaluation::Tidy(records) => records,
        other => panic!("expected tidy output, got {:?}", other),
    };

    let expected_m1 = p.iter().filter(|v| **v < 0.1).count() as f64;
    let expected_m2 = p.iter().filter(|v| **v / 2.0 < 0.1).count() as f64;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].label, "m1");
    assert_eq!(records[0].value, expected_m1);
    assert_eq!(records[1].label, "m2");
    assert_eq!(records[1].value, expected_m2);
}

#[test]
fn test_parallel_matches_serial() {
    let design = many_method_design();
    let serial = build(&design, &BuildConfig::new().truth_column("label")).unwrap();
    let parallel = build(
        &design,
        &BuildConfig::new().truth_column("label").parallel(true).threads(3),
    )
    .unwrap();

    assert_eq!(serial.method_labels(), parallel.method_labels());
    for name in serial.assay_names() {
        assert!(serial
            .assay(name)
            .unwrap()
            .same_values(parallel.assay(name).unwrap()));
    }
    assert!(serial.same_results(&parallel));
}

#[test]
fn test_build_is_deterministic() {
    let design = many_method_design();
    let first = build(&design, &BuildConfig::new()).unwrap();
    let second = build(&design, &BuildConfig::new()).unwrap();
    assert!(first.same_results(&second));
}

#[test]
fn test_partial_failure_isolation() {
    let (p, _) = create_synthetic_cases();
    let result = build(&many_method_design(), &BuildConfig::new()).unwrap();
    let assay = result.assay(DEFAULT_ASSAY).unwrap();

    assert!(assay.column("broken").unwrap().iter().all(|v| v.is_nan()));
    let s3 = assay.column("s3").unwrap();
    for i in 0..50 {
        assert_relative_eq!(s3[i], p[i] * 3.0);
    }

    let idx = result
        .method_labels()
        .iter()
        .position(|l| l == "broken")
        .unwrap();
    let note = result.method_metadata().get(idx, "error").unwrap();
    assert!(note.as_text().unwrap().contains("did not converge"));
}

#[test]
fn test_parallel_isolates_panics_and_errors() {
    let (p, _) = create_synthetic_cases();
    let mut design = many_method_design();
    let panicking = MethodFn::new("explode", |_| -> std::result::Result<Value, MethodError> {
        panic!("index out of range")
    });
    design.add_method(MethodSpec::new("explode", panicking)).unwrap();
    let n = design.len();

    for threads in [0, 2, 64] {
        let config = BuildConfig::new()
            .truth_column("label")
            .parallel(true)
            .threads(threads);
        let result = build(&design, &config).unwrap();
        assert_eq!(result.n_methods(), n);

        let assay = result.assay(DEFAULT_ASSAY).unwrap();
        assert!(assay.column("explode").unwrap().iter().all(|v| v.is_nan()));
        assert!(assay.column("broken").unwrap().iter().all(|v| v.is_nan()));
        let s4 = assay.column("s4").unwrap();
        for i in 0..50 {
            assert_relative_eq!(s4[i], p[i] * 4.0);
        }

        let meta = result.method_metadata();
        let note = |label: &str| {
            let idx = result
                .method_labels()
                .iter()
                .position(|l| l == label)
                .unwrap();
            meta.get(idx, "error").unwrap().clone()
        };
        assert!(note("explode").as_text().unwrap().contains("index out of range"));
        assert!(note("broken").as_text().unwrap().contains("did not converge"));
        assert!(note("m1").is_missing());
    }
}

#[test]
fn test_metric_arity_check() {
    let bad = MetricFunction::new(
        vec![MetricParam::required("truth"), MetricParam::required("query")],
        |_, _, _| 0.0,
    );
    assert!(matches!(bad, Err(BenchError::Configuration(_))));
}

#[test]
fn test_tidy_grid_rows() {
    let mut result = build(&many_method_design(), &BuildConfig::new().truth_column("label")).unwrap();
    let n = result.n_methods();
    add_default_metrics(&mut result, DEFAULT_ASSAY, &["TPR"]).unwrap();

    let grid = ParamGrid::new().with("alpha", vec![0.01, 0.05, 0.1]);
    let out = evaluate(&mut result, &grid, &EvalOptions::new().tidy(true)).unwrap();
    match out {
        Evaluation::Tidy(records) => {
            assert_eq!(records.len(), 3 * n);
            let broken: Vec<&TidyRecord> = records.iter().filter(|r| r.label == "broken").collect();
            assert_eq!(broken.len(), 3);
            assert!(broken.iter().all(|r| r.value.is_nan()));
        }
        other => panic!("expected tidy output, got {:?}", other),
    }
}

#[test]
fn test_subset_single_method_keeps_metadata_row() {
    let result = build(&many_method_design(), &BuildConfig::new()).unwrap();
    let sub = result.subset_methods(&["s2"]).unwrap();

    assert_eq!(sub.n_methods(), 1);
    let meta = sub.method_metadata();
    assert_eq!(meta.n_rows(), 1);
    let idx = result
        .method_labels()
        .iter()
        .position(|l| l == "s2")
        .unwrap();
    assert_eq!(meta.row(0), result.method_metadata().row(idx));
    assert!(sub
        .assay(DEFAULT_ASSAY)
        .unwrap()
        .column("s2")
        .is_some());
}

#[test]
fn test_named_outputs_with_per_assay_truth() {
    let (p, label) = create_synthetic_cases();
    let data = Dataset::from_fields(vec![
        ("p".into(), Value::Numeric(p.clone())),
        ("label".into(), Value::Numeric(label)),
    ])
    .unwrap();

    // Returns both a p-value and a statistic.
    let test = MethodFn::new("test", |args| {
        let x = args.numeric("x")?;
        let stat = x.iter().map(|v| 1.0 - v).collect();
        Ok(Value::Record(vec![
            ("pvalue".into(), Value::Numeric(x)),
            ("stat".into(), Value::Numeric(stat)),
        ]))
    });

    let mut design = BenchDesign::new(data);
    for label in ["t1", "t2"] {
        design
            .add_method(
                MethodSpec::new(label, test.clone())
                    .arg("x", Arg::field("p"))
                    .post_named(vec![
                        ("pv", Transform::field("pvalue")),
                        ("stat", Transform::field("stat")),
                    ]),
            )
            .unwrap();
    }

    let config = BuildConfig::new().with_truth(TruthColumns::per_assay(&[("pv", "label")]));
    let mut result = build(&design, &config).unwrap();
    assert_eq!(result.assay_names(), vec!["pv", "stat"]);
    assert_relative_eq!(result.assay("stat").unwrap().get(0, 1), 1.0 - p[0]);

    add_all_default_metrics(&mut result, "pv").unwrap();
    add_default_metrics(&mut result, "stat", &["TPR"]).unwrap();
    let table = match evaluate(&mut result, &ParamGrid::new(), &EvalOptions::new()).unwrap() {
        Evaluation::Wide(table) => table,
        other => panic!("expected wide output, got {:?}", other),
    };
    assert_eq!(table.n_rows(), 2);
    assert!(table.has_column("pv.TPR"));
    let stat_tpr = table.get(0, "stat.TPR").unwrap().as_number().unwrap();
    assert!(stat_tpr.is_nan());
}

#[test]
fn test_provenance_from_registry() {
    let mut design = BenchDesign::new(dataset());
    design
        .add_method(
            MethodSpec::new("bh", identity().in_package("stats")).arg("x", Arg::field("p")),
        )
        .unwrap();
    design
        .add_method(
            MethodSpec::new("manual", identity())
                .arg("x", Arg::field("p"))
                .meta(MethodMeta::new().pkg_name("custom").pkg_vers("0.2.0")),
        )
        .unwrap();

    let packages = PackageRegistry::new().with("stats", "4.3.1");
    let result = build_with(&design, &BuildConfig::new(), &packages).unwrap();
    let meta = result.method_metadata();
    assert_eq!(meta.get(0, "pkg_vers").unwrap().as_text(), Some("4.3.1"));
    assert_eq!(meta.get(0, "vers_src").unwrap().as_text(), Some("bfunc"));
    assert_eq!(meta.get(1, "pkg_name").unwrap().as_text(), Some("custom"));
    assert_eq!(meta.get(1, "vers_src").unwrap().as_text(), Some("bmeta_manual"));
}

#[test]
fn test_design_file_over_tsv_dataset() {
    let mut data_file = NamedTempFile::new().unwrap();
    writeln!(data_file, "case\tp\tlabel").unwrap();
    writeln!(data_file, "c1\t0.01\t1").unwrap();
    writeln!(data_file, "c2\t0.30\t0").unwrap();
    writeln!(data_file, "c3\t0.04\t1").unwrap();
    writeln!(data_file, "c4\tNA\t0").unwrap();
    data_file.flush().unwrap();

    let yaml = r#"
name: from-file
methods:
  - label: raw
    func: identity
    args:
      - name: x
        field: p
  - label: loose
    func: identity
    args:
      - name: x
        field: p
    meta:
      tags:
        variant: loose
"#;
    let mut catalog = MethodCatalog::new();
    catalog.register_method(identity());

    let design = DesignConfig::from_yaml(yaml)
        .unwrap()
        .into_design(Dataset::from_tsv(data_file.path()).unwrap(), &catalog)
        .unwrap();
    let mut result = build(&design, &BuildConfig::new().truth_column("label")).unwrap();
    assert_eq!(result.row_ids(), &["c1", "c2", "c3", "c4"]);
    assert!(result.assay(DEFAULT_ASSAY).unwrap().get(3, 0).is_nan());

    add_default_metrics(&mut result, DEFAULT_ASSAY, &["TPR", "FPR"]).unwrap();
    let out = evaluate(
        &mut result,
        &ParamGrid::new().with("alpha", vec![0.05]),
        &EvalOptions::new().merge_into_metadata(true),
    )
    .unwrap();
    assert_eq!(
        out,
        Evaluation::Merged(vec![
            "default.TPR[alpha=0.05]".to_string(),
            "default.FPR[alpha=0.05]".to_string(),
        ])
    );
    let meta = result.method_metadata();
    assert_eq!(meta.get(0, "default.TPR[alpha=0.05]"), Some(&Value::Number(1.0)));
    assert_eq!(meta.get(0, "default.FPR[alpha=0.05]"), Some(&Value::Number(0.0)));
    assert_eq!(meta.get(1, "meta.variant").unwrap().as_text(), Some("loose"));

    let dir = tempfile::tempdir().unwrap();
    result.write_tsv_dir(dir.path()).unwrap();
    let metadata = std::fs::read_to_string(dir.path().join("metadata.tsv")).unwrap();
    assert!(metadata.lines().next().unwrap().contains("default.TPR[alpha=0.05]"));
}
