//! Declarative design files.
//!
//! Callables cannot be serialized, so a design file names them by key and a
//! [`MethodCatalog`] supplied by the host maps keys back to callables.

use crate::data::{Dataset, Value};
use crate::design::{Arg, BenchDesign, MethodFn, MethodMeta, MethodSpec, PostProcess, Transform};
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Callables and transforms available to design files, by key.
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    methods: HashMap<String, MethodFn>,
    transforms: HashMap<String, Transform>,
}

impl MethodCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method under its own name.
    pub fn register_method(&mut self, func: MethodFn) -> &mut Self {
        self.methods.insert(func.name().to_string(), func);
        self
    }

    /// Register a transform under its own name.
    pub fn register_transform(&mut self, transform: Transform) -> &mut Self {
        self.transforms
            .insert(transform.name().to_string(), transform);
        self
    }

    /// Look up a method.
    pub fn method(&self, key: &str) -> Result<&MethodFn> {
        self.methods
            .get(key)
            .ok_or_else(|| BenchError::NotFound(format!("catalog method '{}'", key)))
    }

    /// Look up a transform. `field:<name>` keys resolve to field extractors.
    pub fn transform(&self, key: &str) -> Result<Transform> {
        if let Some(t) = self.transforms.get(key) {
            return Ok(t.clone());
        }
        match key.strip_prefix("field:") {
            Some(field) if !field.is_empty() => Ok(Transform::field(field)),
            _ => Err(BenchError::NotFound(format!("catalog transform '{}'", key))),
        }
    }

    /// Registered method keys, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A literal that can be written in a design file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralConfig {
    Bool(bool),
    Number(f64),
    Text(String),
    Numbers(Vec<f64>),
}

impl From<LiteralConfig> for Value {
    fn from(lit: LiteralConfig) -> Self {
        match lit {
            LiteralConfig::Bool(b) => Value::Bool(b),
            LiteralConfig::Number(v) => Value::Number(v),
            LiteralConfig::Text(s) => Value::Text(s),
            LiteralConfig::Numbers(v) => Value::Numeric(v),
        }
    }
}

impl LiteralConfig {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(LiteralConfig::Bool(*b)),
            Value::Number(v) => Some(LiteralConfig::Number(*v)),
            Value::Text(s) => Some(LiteralConfig::Text(s.clone())),
            Value::Numeric(v) => Some(LiteralConfig::Numbers(v.clone())),
            _ => None,
        }
    }
}

/// One argument: exactly one of `field` or `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<LiteralConfig>,
}

/// Post-processing: one transform key, or output-name → transform key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostConfig {
    Single(String),
    Named(Vec<NamedPostConfig>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPostConfig {
    pub output: String,
    pub transform: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_vers: Option<String>,
    /// Catalog key of a callable to derive provenance from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_func: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, LiteralConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub label: String,
    pub func: String,
    #[serde(default)]
    pub args: Vec<ArgConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<PostConfig>,
    #[serde(default)]
    pub meta: MetaConfig,
}

/// Design configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    /// Name of the design.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Methods in order.
    pub methods: Vec<MethodConfig>,
}

impl DesignConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(BenchError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BenchError::from)
    }

    /// Describe an existing design, naming callables by their own names.
    ///
    /// Fails if a literal argument or metadata entry cannot be written.
    pub fn from_design(name: &str, design: &BenchDesign) -> Result<Self> {
        let methods = design
            .methods()
            .iter()
            .map(method_to_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            description: None,
            methods,
        })
    }

    /// Build a design over `dataset`, resolving keys through `catalog`.
    pub fn into_design(self, dataset: Dataset, catalog: &MethodCatalog) -> Result<BenchDesign> {
        let mut design = BenchDesign::new(dataset);
        for method in self.methods {
            design.add_method(method_from_config(method, catalog)?)?;
        }
        Ok(design)
    }
}

fn method_from_config(config: MethodConfig, catalog: &MethodCatalog) -> Result<MethodSpec> {
    let mut spec = MethodSpec::new(&config.label, catalog.method(&config.func)?.clone());

    for arg in config.args {
        let resolved = match (arg.field, arg.value) {
            (Some(field), None) => Arg::Field(field),
            (None, Some(value)) => Arg::Literal(value.into()),
            _ => {
                return Err(BenchError::Configuration(format!(
                    "argument '{}' of method '{}' must set exactly one of 'field' or 'value'",
                    arg.name, config.label
                )))
            }
        };
        spec = spec.arg(&arg.name, resolved);
    }

    spec = match config.post {
        None => spec,
        Some(PostConfig::Single(key)) => spec.post_fn(catalog.transform(&key)?),
        Some(PostConfig::Named(outputs)) => {
            if outputs.is_empty() {
                return Err(BenchError::Configuration(format!(
                    "method '{}' declares an empty post-processing mapping",
                    config.label
                )));
            }
            let named = outputs
                .into_iter()
                .map(|o| -> Result<(String, Transform)> {
                    Ok((o.output, catalog.transform(&o.transform)?))
                })
                .collect::<Result<Vec<_>>>()?;
            spec.post(PostProcess::Named(named))
        }
    };

    let mut meta = MethodMeta::new();
    if let Some(name) = &config.meta.pkg_name {
        meta = meta.pkg_name(name);
    }
    if let Some(vers) = &config.meta.pkg_vers {
        meta = meta.pkg_vers(vers);
    }
    if let Some(key) = &config.meta.pkg_func {
        meta = meta.pkg_func(catalog.method(key)?.clone());
    }
    for (k, v) in config.meta.tags {
        meta = meta.with(&k, Value::from(v))?;
    }
    Ok(spec.meta(meta))
}

fn method_to_config(spec: &MethodSpec) -> Result<MethodConfig> {
    let unwritable = |what: &str| {
        BenchError::Configuration(format!(
            "method '{}': {} cannot be written to a design file",
            spec.label(),
            what
        ))
    };

    let args = spec
        .args()
        .iter()
        .map(|(name, arg)| -> Result<ArgConfig> {
            let (field, value) = match arg {
                Arg::Field(field) => (Some(field.clone()), None),
                Arg::Literal(value) => {
                    let lit = LiteralConfig::from_value(value)
                        .ok_or_else(|| unwritable(&format!("argument '{}'", name)))?;
                    (None, Some(lit))
                }
            };
            Ok(ArgConfig {
                name: name.clone(),
                field,
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let post = match spec.post_process() {
        PostProcess::None => None,
        PostProcess::Single(t) => Some(PostConfig::Single(t.name().to_string())),
        PostProcess::Named(outputs) => Some(PostConfig::Named(
            outputs
                .iter()
                .map(|(k, t)| NamedPostConfig {
                    output: k.clone(),
                    transform: t.name().to_string(),
                })
                .collect(),
        )),
    };

    let meta_src = spec.method_meta();
    let tags = meta_src
        .extra()
        .iter()
        .map(|(k, v)| {
            LiteralConfig::from_value(v)
                .map(|lit| (k.clone(), lit))
                .ok_or_else(|| unwritable(&format!("metadata '{}'", k)))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(MethodConfig {
        label: spec.label().to_string(),
        func: spec.func().name().to_string(),
        args,
        post,
        meta: MetaConfig {
            pkg_name: meta_src.manual_pkg_name().map(str::to_string),
            pkg_vers: meta_src.manual_pkg_vers().map(str::to_string),
            pkg_func: meta_src.provenance_func().map(|f| f.name().to_string()),
            tags,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MethodCatalog {
        let mut catalog = MethodCatalog::new();
        catalog
            .register_method(MethodFn::new("identity", |args| {
                Ok(args.require("x")?.clone())
            }))
            .register_method(
                MethodFn::new("version_probe", |_| Ok(Value::Missing)).in_package("probe"),
            );
        catalog
    }

    fn dataset() -> Dataset {
        Dataset::from_fields(vec![("p".into(), Value::Numeric(vec![0.1, 0.2]))]).unwrap()
    }

    const YAML: &str = r#"
name: example
methods:
  - label: m1
    func: identity
    args:
      - name: x
        field: p
  - label: m2
    func: identity
    args:
      - name: x
        field: p
      - name: alpha
        value: 0.05
    post: "field:pvalue"
    meta:
      pkg_func: version_probe
      tags:
        note: second
"#;

    #[test]
    fn test_from_yaml_into_design() {
        let config = DesignConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.methods.len(), 2);

        let design = config.into_design(dataset(), &catalog()).unwrap();
        assert_eq!(design.labels(), vec!["m1", "m2"]);
        let m2 = design.method("m2").unwrap();
        assert_eq!(m2.get_arg("alpha"), Some(&Arg::literal(0.05)));
        assert_eq!(m2.post_process().describe(), "field:pvalue");
        assert_eq!(
            m2.method_meta().provenance_func().map(|f| f.name()),
            Some("version_probe")
        );
        assert_eq!(
            m2.method_meta().extra(),
            &[("note".to_string(), Value::Text("second".into()))]
        );
    }

    #[test]
    fn test_unknown_catalog_key() {
        let mut config = DesignConfig::from_yaml(YAML).unwrap();
        config.methods[0].func = "missing".into();
        let err = config.into_design(dataset(), &catalog()).unwrap_err();
        assert!(matches!(err, BenchError::NotFound(_)));
    }

    #[test]
    fn test_arg_needs_exactly_one_source() {
        let mut config = DesignConfig::from_yaml(YAML).unwrap();
        config.methods[0].args[0].value = Some(LiteralConfig::Number(1.0));
        let err = config.into_design(dataset(), &catalog()).unwrap_err();
        assert!(matches!(err, BenchError::Configuration(_)));
    }

    #[test]
    fn test_yaml_roundtrip_through_design() {
        let design = DesignConfig::from_yaml(YAML)
            .unwrap()
            .into_design(dataset(), &catalog())
            .unwrap();
        let written = DesignConfig::from_design("example", &design).unwrap();
        let yaml = written.to_yaml().unwrap();
        let parsed = DesignConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, written);
        assert_eq!(parsed.methods[1].meta.pkg_func.as_deref(), Some("version_probe"));
    }
}
