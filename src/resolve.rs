//! Core resolution pipeline: merge the value layers and build the schema.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, making the full
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Flatten the CLI values and keep only the entered paths
//! 2. Point `config` at the loaded file, or drop it if the schema has no such field
//! 3. Overlay the entered CLI values on the flattened file values
//! 4. Check the explicitly required paths
//! 5. Unflatten and construct, letting the registry fill defaults

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::cli::CONFIG_KEY;
use crate::error::ArgError;
use crate::flatten::{flatten, unflatten};
use crate::registry::{construct, register};
use crate::schema::ArgSchema;

/// All pre-loaded data needed to resolve a schema. No I/O happens here.
pub struct ResolveInput {
    /// Nested values from the CLI parse, defaults included.
    pub cli_values: Map<String, Value>,
    /// Dotted paths the user actually typed.
    pub entered: BTreeSet<String>,
    /// The loaded config file and the path it was read from.
    pub file: Option<(PathBuf, Map<String, Value>)>,
    /// Dotted paths some source must supply.
    pub required: Vec<String>,
    /// Whether to reject keys that match no declared field.
    pub strict: bool,
}

/// Resolve `S` from pre-loaded inputs. Entered CLI values win over the file,
/// the file wins over declared defaults.
pub fn resolve<S: ArgSchema>(input: ResolveInput) -> Result<S, ArgError> {
    let schema = register::<S>()?;

    // 1: Only what the user typed may override the file
    let mut cli = input.cli_values;
    flatten(&mut cli);
    cli.retain(|key, _| input.entered.contains(key));

    // 2: The config path is construction input only when declared
    match &input.file {
        Some((path, _)) if schema.has_field(CONFIG_KEY) => {
            cli.insert(
                CONFIG_KEY.to_string(),
                Value::String(path.display().to_string()),
            );
        }
        _ if !schema.has_field(CONFIG_KEY) => {
            cli.remove(CONFIG_KEY);
        }
        _ => {}
    }

    // 3: File first, CLI on top
    let mut merged = match input.file {
        Some((_, mut values)) => {
            flatten(&mut values);
            values
        }
        None => Map::new(),
    };
    merged.extend(cli);
    tracing::debug!(keys = merged.len(), "Merged file and command-line values");

    // 4: Required paths must come from a source, not a default
    for required in &input.required {
        let path = required.trim_start_matches("--");
        if !is_supplied(&merged, path) {
            return Err(ArgError::MissingRequiredField(path.to_string()));
        }
    }

    // 5: Registry fills defaults and materializes nested schemas
    unflatten(&mut merged)?;
    construct(merged, input.strict)
}

fn is_supplied(flat: &Map<String, Value>, path: &str) -> bool {
    let prefix = format!("{path}.");
    flat.keys().any(|key| key == path || key.starts_with(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::NestedArgParser;
    use crate::fixtures::test::{ExperimentArgs, RequiredArgs, WithConfigField};
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    fn input<S: ArgSchema>(args: &[&str], file: Option<Value>) -> ResolveInput {
        let parser = NestedArgParser::<S>::new("train.py", &[]).unwrap();
        let parsed = parser.parse(args.iter().copied()).unwrap();
        ResolveInput {
            cli_values: parsed.values,
            entered: parsed.entered,
            file: file.map(|v| (PathBuf::from("/cfg/train.yaml"), map(v))),
            required: vec![],
            strict: true,
        }
    }

    #[test]
    fn defaults_only() {
        let args: ExperimentArgs = resolve(input::<ExperimentArgs>(&[], None)).unwrap();
        assert_eq!(args.train.lr, 1e-3);
        assert!(args.env.static_env);
        assert_eq!(args.workers, 1);
    }

    #[test]
    fn cli_overrides_file() {
        let file = json!({"train": {"lr": 1e-4}});
        let args: ExperimentArgs =
            resolve(input::<ExperimentArgs>(&["--train.lr=5e-4"], Some(file))).unwrap();
        assert_eq!(args.train.lr, 5e-4);
    }

    #[test]
    fn file_used_without_override() {
        let file = json!({"train": {"lr": 1e-4}});
        let args: ExperimentArgs = resolve(input::<ExperimentArgs>(&[], Some(file))).unwrap();
        assert_eq!(args.train.lr, 1e-4);
    }

    #[test]
    fn cli_defaults_do_not_override_file() {
        let file = json!({"workers": 6, "env": {"static_env": false}});
        let args: ExperimentArgs =
            resolve(input::<ExperimentArgs>(&["--train.epochs", "2"], Some(file))).unwrap();
        assert_eq!(args.workers, 6);
        assert!(!args.env.static_env);
        assert_eq!(args.train.epochs, 2);
    }

    #[test]
    fn pre_flattened_file_accepted() {
        let file = json!({"train.lr": 0.25, "env.name": "hopper"});
        let args: ExperimentArgs = resolve(input::<ExperimentArgs>(&[], Some(file))).unwrap();
        assert_eq!(args.train.lr, 0.25);
        assert_eq!(args.env.name, "hopper");
    }

    #[test]
    fn negation_resolves_false() {
        let args: ExperimentArgs =
            resolve(input::<ExperimentArgs>(&["--no_env.static_env"], None)).unwrap();
        assert!(!args.env.static_env);
    }

    #[test]
    fn negation_overrides_file_true() {
        let file = json!({"env": {"static_env": true}});
        let args: ExperimentArgs =
            resolve(input::<ExperimentArgs>(&["--no_env.static_env"], Some(file))).unwrap();
        assert!(!args.env.static_env);
    }

    #[test]
    fn file_leaf_and_subtree_conflict() {
        let file = json!({"train": 1, "train.lr": 2});
        let err = resolve::<ExperimentArgs>(input::<ExperimentArgs>(&[], Some(file))).unwrap_err();
        match err {
            ArgError::KeyConflict { key, conflicting } => {
                assert_eq!(key, "train.lr");
                assert_eq!(conflicting, "train");
            }
            other => panic!("Expected KeyConflict, got: {other:?}"),
        }
    }

    #[test]
    fn missing_required_field() {
        let err = resolve::<RequiredArgs>(input::<RequiredArgs>(&[], None)).unwrap_err();
        assert!(matches!(err, ArgError::MissingRequiredField(p) if p == "name"));
    }

    #[test]
    fn required_field_from_file() {
        let file = json!({"name": "run-1"});
        let args: RequiredArgs = resolve(input::<RequiredArgs>(&[], Some(file))).unwrap();
        assert_eq!(args.name, "run-1");
        assert_eq!(args.count, 3);
    }

    #[test]
    fn required_paths_need_a_source() {
        let mut inp = input::<ExperimentArgs>(&[], None);
        inp.required = vec!["--train.lr".into()];
        let err = resolve::<ExperimentArgs>(inp).unwrap_err();
        assert!(matches!(err, ArgError::MissingRequiredField(p) if p == "train.lr"));

        let mut inp = input::<ExperimentArgs>(&["--train.lr", "0.1"], None);
        inp.required = vec!["train.lr".into()];
        let args: ExperimentArgs = resolve(inp).unwrap();
        assert_eq!(args.train.lr, 0.1);
    }

    #[test]
    fn required_subtree_satisfied_by_any_leaf() {
        let mut inp = input::<ExperimentArgs>(&[], Some(json!({"env": {"render": true}})));
        inp.required = vec!["env".into()];
        let args: ExperimentArgs = resolve(inp).unwrap();
        assert!(args.env.render);
    }

    #[test]
    fn undeclared_config_is_dropped() {
        let file = json!({"workers": 3});
        let args: ExperimentArgs =
            resolve(input::<ExperimentArgs>(&["-c", "/cfg"], Some(file))).unwrap();
        assert_eq!(args.workers, 3);
    }

    #[test]
    fn declared_config_gets_resolved_path() {
        let file = json!({"lr": 0.7});
        let args: WithConfigField =
            resolve(input::<WithConfigField>(&["--config", "/cfg"], Some(file))).unwrap();
        assert_eq!(args.config.as_deref(), Some("/cfg/train.yaml"));
        assert_eq!(args.lr, 0.7);
    }

    #[test]
    fn unknown_file_key_strict_and_lenient() {
        let file = json!({"train": {"lrr": 0.1}});
        let err =
            resolve::<ExperimentArgs>(input::<ExperimentArgs>(&[], Some(file.clone()))).unwrap_err();
        assert!(matches!(err, ArgError::UnknownField(p) if p == "train.lrr"));

        let mut inp = input::<ExperimentArgs>(&[], Some(file));
        inp.strict = false;
        let args: ExperimentArgs = resolve(inp).unwrap();
        assert_eq!(args.train.lr, 1e-3);
    }

    #[test]
    fn file_supplies_schema_collections() {
        let file = json!({
            "layers": [{"width": 128}],
            "heads": {"pi": {"width": 4, "activation": "tanh"}}
        });
        let args: ExperimentArgs = resolve(input::<ExperimentArgs>(&[], Some(file))).unwrap();
        assert_eq!(args.layers[0].width, 128);
        assert_eq!(args.heads["pi"].activation, "tanh");
    }
}
