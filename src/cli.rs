//! Nested CLI parser built on clap's builder API.
//!
//! [`NestedArgParser`] walks a schema tree through the field resolver and
//! registers one `--{dotted.path}` argument per leaf field on a runtime
//! [`clap::Command`]. Flags of a nested schema that declares a group are
//! listed under that group's help heading.
//!
//! Before clap sees the command line, the tokens are scanned once against
//! the known flag names. The scan yields the entered paths (the flags the
//! user actually typed, as opposed to defaults filled in afterwards) and
//! sets aside unknown options and stray values so they are reported with a
//! warning instead of aborting the parse.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde_json::{Map, Value};

use crate::error::ArgError;
use crate::field::{Arity, FlagSpec, Resolution, resolve_field};
use crate::flatten::unflatten;
use crate::registry::{Schema, construct, register};
use crate::schema::ArgSchema;

/// Dotted path of the config-file flag.
pub const CONFIG_KEY: &str = "config";

/// Result of [`NestedArgParser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArgs {
    /// Nested values: every entered flag, plus declared defaults for the rest.
    pub values: Map<String, Value>,
    /// Dotted paths the command line actually named.
    pub entered: BTreeSet<String>,
    /// Tokens that matched no flag, in order.
    pub unrecognized: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Flag(usize),
    Negation(usize),
    Config,
}

#[derive(Debug, Default)]
struct Scan {
    known: Vec<String>,
    unrecognized: Vec<String>,
    entered: BTreeSet<String>,
}

/// CLI parser for the schema `S`.
pub struct NestedArgParser<S> {
    schema: Schema,
    flags: Vec<FlagSpec>,
    targets: HashMap<String, Target>,
    config_flag: bool,
    command: Command,
    _schema: PhantomData<fn() -> S>,
}

impl<S: ArgSchema> NestedArgParser<S> {
    /// Register every leaf field of `S` as a flag.
    ///
    /// Paths in `required_args` are marked required in help output. Two
    /// fields that would share a flag name, including `--help`, the built-in
    /// `--config` and the `--no_` switches, fail with
    /// [`ArgError::FlagConflict`].
    pub fn new(program: &str, required_args: &[String]) -> Result<Self, ArgError> {
        let schema = register::<S>()?;
        let mut flags = Vec::new();
        collect_flags(&schema, "", required_args, &mut flags)?;
        let config_flag = !schema.has_field(CONFIG_KEY);
        check_flag_names(&flags, config_flag)?;

        let mut targets = HashMap::new();
        for (idx, spec) in flags.iter().enumerate() {
            targets.insert(spec.path.clone(), Target::Flag(idx));
            if let Some(negation) = &spec.negation {
                targets.insert(negation.clone(), Target::Negation(idx));
            }
        }
        if config_flag {
            targets.insert(CONFIG_KEY.to_string(), Target::Config);
        }

        let command = build_command(program, &flags, config_flag);
        Ok(Self {
            schema,
            flags,
            targets,
            config_flag,
            command,
            _schema: PhantomData,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn flags(&self) -> &[FlagSpec] {
        &self.flags
    }

    /// Parse command-line tokens (without the program name).
    ///
    /// Unknown tokens are logged and returned, never fatal. `--help` comes
    /// back as [`ArgError::Cli`] carrying clap's rendered help.
    pub fn parse<I, T>(&self, args: I) -> Result<ParsedArgs, ArgError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tokens: Vec<String> = args.into_iter().map(Into::into).collect();
        let scan = self.scan(&tokens);
        if !scan.unrecognized.is_empty() {
            tracing::warn!(
                tokens = ?scan.unrecognized,
                "Unrecognized arguments ignored"
            );
        }

        let argv = std::iter::once(self.command.get_name().to_string()).chain(scan.known);
        let matches = self.command.clone().try_get_matches_from(argv)?;

        let mut flat = Map::new();
        for spec in &self.flags {
            let mut value = match matches.get_many::<String>(&spec.path) {
                Some(raws) => {
                    let raws: Vec<String> = raws.cloned().collect();
                    Some(spec.coerce_all(&raws)?)
                }
                None => spec.default.clone(),
            };
            if let Some(negation) = &spec.negation
                && negated_last(&matches, &spec.path, negation)
            {
                value = Some(Value::Bool(false));
            }
            if let Some(value) = value {
                flat.insert(spec.path.clone(), value);
            }
        }
        if self.config_flag
            && let Some(config) = matches.get_one::<String>(CONFIG_KEY)
        {
            flat.insert(CONFIG_KEY.to_string(), Value::String(config.clone()));
        }

        unflatten(&mut flat)?;
        Ok(ParsedArgs {
            values: flat,
            entered: scan.entered,
            unrecognized: scan.unrecognized,
        })
    }

    /// Build `S` straight from a JSON document, bypassing defaults merging
    /// with the command line.
    pub fn parse_from_file(&self, path: &Path) -> Result<S, ArgError> {
        let content = fs::read_to_string(path).map_err(|e| ArgError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| ArgError::JsonError {
            path: path.to_path_buf(),
            source: e,
        })?;
        match value {
            Value::Object(map) => self.parse_from_dict(map),
            _ => Err(ArgError::InvalidValue {
                key: path.display().to_string(),
                reason: "top level must be a mapping".into(),
            }),
        }
    }

    /// Build `S` from an in-memory mapping, nested or dotted.
    ///
    /// Top-level keys that name no declared field are dropped.
    pub fn parse_from_dict(&self, mut values: Map<String, Value>) -> Result<S, ArgError> {
        values.retain(|key, _| {
            let head = key.split('.').next().unwrap_or(key);
            self.schema.has_field(head)
        });
        unflatten(&mut values)?;
        construct(values, true)
    }

    /// Help text as `--help` would print it.
    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    fn scan(&self, tokens: &[String]) -> Scan {
        let mut scan = Scan::default();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;

            if token == "--" {
                scan.unrecognized.extend(tokens[i..].iter().cloned());
                break;
            }
            if token == "-h" || token == "--help" {
                scan.known.push(token.clone());
                continue;
            }

            let Some((target, inline)) = self.classify(token) else {
                scan.unrecognized.push(token.clone());
                if !is_value(token) && !token.contains('=') {
                    let values = take_values(tokens, &mut i, Arity::OneOrMore);
                    scan.unrecognized.extend(values);
                }
                continue;
            };

            scan.known.push(token.clone());
            let arity = match target {
                Target::Flag(idx) => {
                    scan.entered.insert(self.flags[idx].path.clone());
                    Some(self.flags[idx].arity)
                }
                Target::Negation(idx) => {
                    scan.entered.insert(self.flags[idx].path.clone());
                    None
                }
                Target::Config => {
                    scan.entered.insert(CONFIG_KEY.to_string());
                    Some(Arity::One)
                }
            };
            if let Some(arity) = arity
                && !inline
            {
                scan.known.extend(take_values(tokens, &mut i, arity));
            }
        }
        scan
    }

    /// Match a token to a flag; the flag reports whether its value is inline.
    fn classify(&self, token: &str) -> Option<(Target, bool)> {
        if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, _)) => (name, true),
                None => (body, false),
            };
            return self.targets.get(name).map(|t| (*t, inline));
        }
        if self.config_flag && let Some(rest) = token.strip_prefix("-c") {
            return Some((Target::Config, !rest.is_empty()));
        }
        None
    }
}

fn collect_flags(
    schema: &Schema,
    parent: &str,
    required_args: &[String],
    out: &mut Vec<FlagSpec>,
) -> Result<(), ArgError> {
    for field in schema.fields() {
        match resolve_field(field, parent, schema.group(), required_args)? {
            Resolution::Skip => {}
            Resolution::Flag(spec) => out.push(spec),
            Resolution::Recurse {
                schema: nested,
                path,
            } => {
                let nested = schema.nested_or_register(nested)?;
                collect_flags(&nested, &path, required_args, out)?;
            }
        }
    }
    Ok(())
}

/// Every long flag name must be unique; clap reserves `help`.
fn check_flag_names(flags: &[FlagSpec], config_flag: bool) -> Result<(), ArgError> {
    let mut names: HashSet<&str> = HashSet::from(["help"]);
    if config_flag {
        names.insert(CONFIG_KEY);
    }
    for spec in flags {
        for name in std::iter::once(&spec.path).chain(&spec.negation) {
            if !names.insert(name.as_str()) {
                return Err(ArgError::FlagConflict(name.clone()));
            }
        }
    }
    Ok(())
}

fn build_command(program: &str, flags: &[FlagSpec], config_flag: bool) -> Command {
    let mut command = Command::new(program.to_string())
        .args_override_self(true)
        .allow_negative_numbers(true);

    for spec in flags {
        let mut arg = Arg::new(spec.path.clone())
            .long(spec.path.clone())
            .value_parser(value_parser!(String))
            .action(ArgAction::Set)
            .help(spec.describe());
        arg = match spec.arity {
            Arity::One => arg.num_args(1),
            Arity::ZeroOrOne => arg.num_args(0..=1).default_missing_value("true"),
            Arity::OneOrMore => arg.num_args(1..),
        };
        if let Some(name) = &spec.value_name {
            arg = arg.value_name(name.clone());
        }
        if let Some(group) = spec.group {
            arg = arg.help_heading(group);
        }
        command = command.arg(arg);

        if let Some(negation) = &spec.negation {
            let mut arg = Arg::new(negation.clone())
                .long(negation.clone())
                .action(ArgAction::SetTrue)
                .help(format!("Set {} to false", spec.path));
            if let Some(group) = spec.group {
                arg = arg.help_heading(group);
            }
            command = command.arg(arg);
        }
    }

    if config_flag {
        command = command.arg(
            Arg::new(CONFIG_KEY)
                .short('c')
                .long(CONFIG_KEY)
                .value_parser(value_parser!(String))
                .num_args(1)
                .help("Config file (.yaml or .json), or a directory holding <program>.yaml"),
        );
    }
    command
}

/// Whether the store-false switch came after the last explicit value.
fn negated_last(matches: &ArgMatches, path: &str, negation: &str) -> bool {
    if matches.value_source(negation) != Some(ValueSource::CommandLine) {
        return false;
    }
    let negated_at = matches.index_of(negation);
    let set_at = matches
        .indices_of(path)
        .and_then(|indices| indices.max());
    match (negated_at, set_at) {
        (Some(negated), Some(set)) => negated > set,
        _ => true,
    }
}

/// Values are anything not shaped like an option; negative numbers count.
fn is_value(token: &str) -> bool {
    !token.starts_with('-') || token == "-" || token.parse::<f64>().is_ok()
}

fn take_values(tokens: &[String], i: &mut usize, arity: Arity) -> Vec<String> {
    let limit = match arity {
        Arity::One | Arity::ZeroOrOne => 1,
        Arity::OneOrMore => usize::MAX,
    };
    let mut taken = Vec::new();
    while taken.len() < limit && *i < tokens.len() && is_value(&tokens[*i]) {
        taken.push(tokens[*i].clone());
        *i += 1;
    }
    taken
}
