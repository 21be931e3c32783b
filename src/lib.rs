//! Declarative, nested argument schemas for experiment-style programs.
//! Declare the parameters once, get them back resolved from defaults, a
//! config file and the command line.
//!
//! A schema is a plain serde struct that also implements [`ArgSchema`],
//! listing its fields with their types, defaults and help text. Schemas nest:
//! a field can hold another schema, a list of schemas or a string-keyed map
//! of schemas, to any depth.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Args {
//!     train: TrainArgs,
//!     env: EnvArgs,
//! }
//!
//! impl ArgSchema for Args {
//!     fn fields() -> Vec<Field> {
//!         vec![Field::nested::<TrainArgs>("train"), Field::nested::<EnvArgs>("env")]
//!     }
//! }
//!
//! let args: Args = argclass::resolve(&[])?;
//! ```
//!
//! That single call registers `--train.lr`, `--env.static_env`,
//! `--no_env.static_env` and friends, reads the file named by `--config`,
//! fills in declared defaults, and hands you a typed struct.
//!
//! # Layer precedence
//!
//! ```text
//! Declared defaults     Field::default / default_factory
//!        ↑ overridden by
//! Config file           --config run.yaml, or --config dir/ for dir/<program>.yaml
//!        ↑ overridden by
//! Command line          only the flags actually typed
//! ```
//!
//! The command line only overrides what the user typed. A flag's default
//! never shadows a value from the config file; the set of entered paths is
//! computed from the tokens themselves.
//!
//! # Flags
//!
//! Every leaf field becomes one flag named by its dotted path. The flag shape
//! follows from the declared type:
//!
//! | Field type | Flag |
//! |------------|------|
//! | `i64`, `f64`, `String` | `--path VALUE` |
//! | `bool`, `Option<bool>` | `--path [VALUE]`, bare means `true` |
//! | `bool` defaulting to `true` | also `--no_path` |
//! | `Option<X>` | as `X` |
//! | `Vec<X>` of scalars | `--path V1 V2 ...` |
//! | enum ([`ArgEnum`]) | `--path CHOICE` |
//! | nested schema | no flag, its fields recurse |
//! | `Vec<S>`, `BTreeMap<String, S>` of schemas | no flag, file or dict only |
//!
//! Fields whose name starts with `_` are private: they get no flag and are
//! left out of [`public_attributes`], but they still round-trip through
//! [`to_plain_dict`]. Boolean tokens are case-insensitive
//! `yes/true/t/y/1` and `no/false/f/n/0`.
//!
//! Unknown flags are reported with a `tracing` warning and skipped.
//!
//! # Config files
//!
//! YAML (path contains `.yaml`) or JSON (path contains `.json`). Keys may be
//! nested or pre-flattened (`train.lr: 0.1`); both normalize through
//! [`flatten`] and [`unflatten`]. A dotted key that collides with a plain
//! value at one of its prefixes fails with [`ArgError::KeyConflict`].
//!
//! If the schema declares its own `config` field it replaces the built-in
//! `--config`/`-c` flag and receives the resolved file path.
//!
//! # Strict mode
//!
//! Strict mode is **on by default**. A config key that matches no field
//! fails with [`ArgError::UnknownField`]. Turn it off with
//! [`.strict(false)`](ArgclassBuilder::strict) to share config files across
//! programs.
//!
//! # Error handling
//!
//! All fallible operations return [`ArgError`]. Messages name the offending
//! dotted path or file. See the [`error`] module for the full set.

pub mod error;
pub mod schema;
pub mod types;

mod builder;
mod cli;
mod field;
mod file;
mod flatten;
mod registry;
mod resolve;

#[cfg(test)]
mod fixtures;

pub use builder::{Argclass, ArgclassBuilder};
pub use cli::{CONFIG_KEY, NestedArgParser, ParsedArgs};
pub use error::ArgError;
pub use field::{Arity, FlagSpec, ValueKind, string_to_bool};
pub use file::{load_config_file, resolve_config_path};
pub use flatten::{flatten, unflatten};
pub use registry::{Schema, construct, public_attributes, register, to_plain_dict};
pub use schema::{ArgEnum, ArgSchema, ArgValue, Field, SchemaRef};
pub use types::{FieldDefault, FieldType, Scalar};

/// Resolve `S` from the process arguments with the default settings.
///
/// `required_paths` are dotted paths that the config file or the command line
/// must supply. Shorthand for
/// `Argclass::builder::<S>().required_args(required_paths).load()`.
pub fn resolve<S: ArgSchema>(required_paths: &[&str]) -> Result<S, ArgError> {
    Argclass::builder::<S>()
        .required_args(required_paths.iter().copied())
        .load()
}
