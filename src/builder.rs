use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::cli::{CONFIG_KEY, NestedArgParser, ParsedArgs};
use crate::error::ArgError;
use crate::file;
use crate::registry::to_plain_dict;
use crate::resolve::{self, ResolveInput};
use crate::schema::ArgSchema;

const FALLBACK_PROGRAM: &str = "program";

/// Entry point for resolving an argument schema.
pub struct Argclass;

impl Argclass {
    pub fn builder<S: ArgSchema>() -> ArgclassBuilder<S> {
        ArgclassBuilder::new()
    }
}

/// Builder for resolving `S` from defaults, a config file and the command line.
///
/// ```ignore
/// let args: TrainArgs = Argclass::builder()
///     .required_args(["train.lr"])
///     .print_args(false)
///     .load()?;
/// ```
pub struct ArgclassBuilder<S: ArgSchema> {
    required_args: Vec<String>,
    print_args: bool,
    resolve_config: bool,
    strict: bool,
    program_name: Option<String>,
    _phantom: PhantomData<S>,
}

impl<S: ArgSchema> ArgclassBuilder<S> {
    fn new() -> Self {
        Self {
            required_args: Vec::new(),
            print_args: true,
            resolve_config: true,
            strict: true,
            program_name: None,
            _phantom: PhantomData,
        }
    }

    /// Dotted paths that must be supplied by the config file or the command
    /// line. A leading `--` is accepted.
    pub fn required_args<I, T>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.required_args = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Print the resolved arguments to stdout (default: `true`).
    pub fn print_args(mut self, print: bool) -> Self {
        self.print_args = print;
        self
    }

    /// Load the file named by `--config` (default: `true`).
    /// When disabled the flag is still accepted but no file is read.
    pub fn resolve_config(mut self, resolve: bool) -> Self {
        self.resolve_config = resolve;
        self
    }

    /// Enable or disable strict mode (default: `true`).
    /// In strict mode, config keys that match no field produce errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Override the program name used in help output and for resolving a
    /// config directory (default: `argv[0]`).
    pub fn program_name(mut self, name: &str) -> Self {
        self.program_name = Some(name.to_string());
        self
    }

    fn effective_program_name(&self, argv0: Option<&str>) -> String {
        self.program_name
            .as_deref()
            .or(argv0)
            .unwrap_or(FALLBACK_PROGRAM)
            .to_string()
    }

    /// Load the config file the command line points at, if any.
    fn load_file(
        &self,
        parsed: &ParsedArgs,
        program: &str,
    ) -> Result<Option<(PathBuf, Map<String, Value>)>, ArgError> {
        if !self.resolve_config || !parsed.entered.contains(CONFIG_KEY) {
            return Ok(None);
        }
        let config = match parsed.values.get(CONFIG_KEY) {
            Some(Value::String(config)) if !config.is_empty() => config,
            _ => return Ok(None),
        };

        let path = file::resolve_config_path(Path::new(config), program);
        tracing::debug!(config = %config, path = %path.display(), "Loading config file");
        let values = file::load_config_file(&path)?;
        Ok(Some((path, values)))
    }

    /// Build the `ResolveInput` from the command line.
    fn build_input<I>(&self, program: &str, tokens: I) -> Result<ResolveInput, ArgError>
    where
        I: IntoIterator<Item = String>,
    {
        let parser = NestedArgParser::<S>::new(program, &self.required_args)?;
        let parsed = parser.parse(tokens)?;
        let file = self.load_file(&parsed, program)?;

        Ok(ResolveInput {
            cli_values: parsed.values,
            entered: parsed.entered,
            file,
            required: self.required_args.clone(),
            strict: self.strict,
        })
    }

    /// Resolve from an explicit argument list whose first item is the
    /// program name, as in `std::env::args()`.
    pub fn load_from<I, T>(self, args: I) -> Result<S, ArgError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let argv0: Option<String> = args.next();
        let program = self.effective_program_name(argv0.as_deref());

        let input = self.build_input(&program, args)?;
        let resolved: S = resolve::resolve(input)?;
        if self.print_args {
            print_resolved(&resolved)?;
        }
        Ok(resolved)
    }

    /// Resolve from the process arguments.
    ///
    /// `--help` prints the generated help and exits, like clap's `parse`.
    /// Every other failure is returned.
    pub fn load(self) -> Result<S, ArgError> {
        match self.load_from(std::env::args()) {
            Err(err) if err.is_display_request() => match err {
                ArgError::Cli(e) => e.exit(),
                other => Err(other),
            },
            result => result,
        }
    }
}

/// Print the resolved arguments under a banner, as pretty JSON.
fn print_resolved<S: ArgSchema>(resolved: &S) -> Result<(), ArgError> {
    let plain = to_plain_dict(resolved)?;
    let pretty = serde_json::to_string_pretty(&plain).map_err(|e| ArgError::InvalidValue {
        key: "<resolved>".into(),
        reason: e.to_string(),
    })?;
    let rule = "=".repeat(20);
    println!("{rule} Resolved Arguments {rule}");
    println!("{pretty}");
    Ok(())
}
