//! Field resolver: turns one declared field into a CLI flag description.
//!
//! The decision is made from the field's [`FieldType`] alone, in this order:
//! private fields are skipped, enums become choice flags, nested schemas are
//! recursed into, booleans become optional-value switches (with a `no_`
//! twin when they default to true), `Option<X>` is unwrapped, sequences of
//! scalars take one or more values and plain scalars take exactly one.

use serde_json::{Number, Value};

use crate::error::ArgError;
use crate::flatten::dotted;
use crate::schema::{Field, SchemaRef};
use crate::types::{FieldType, Scalar};

/// How a flag's raw string values are coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Bool,
    Int,
    /// Parsed as `f64`. Only finite values are accepted, since a JSON number
    /// cannot hold `inf` or `nan`.
    Float,
    Str,
    /// One of a fixed set; parsed as the type of the first choice.
    Choice(Vec<Value>),
}

/// How many values a flag takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    /// A bare flag means `true`.
    ZeroOrOne,
    OneOrMore,
}

/// Everything needed to register and interpret one leaf flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    /// Dotted path; the flag is `--{path}`.
    pub path: String,
    pub kind: ValueKind,
    pub arity: Arity,
    pub default: Option<Value>,
    pub required: bool,
    /// Name of the paired store-false switch, without dashes.
    pub negation: Option<String>,
    pub help: Option<String>,
    pub value_name: Option<String>,
    pub group: Option<&'static str>,
}

/// Outcome of resolving one field.
#[derive(Debug)]
pub enum Resolution {
    /// No flag: private field or a collection of schemas.
    Skip,
    Flag(FlagSpec),
    /// A nested schema whose fields live under `path`.
    Recurse { schema: SchemaRef, path: String },
}

/// Resolve `field` declared under `parent` into a flag, a recursion or nothing.
///
/// `required_args` lists dotted paths (a leading `--` is tolerated) whose
/// flags are marked required whatever their default.
pub fn resolve_field(
    field: &Field,
    parent: &str,
    group: Option<&'static str>,
    required_args: &[String],
) -> Result<Resolution, ArgError> {
    if field.is_private() {
        return Ok(Resolution::Skip);
    }
    let path = dotted(parent, field.name());
    let mut resolution = resolve_type(field.ty(), field, path)?;

    if let Resolution::Flag(spec) = &mut resolution {
        spec.group = group;
        if required_args
            .iter()
            .any(|r| r.trim_start_matches("--") == spec.path)
        {
            spec.required = true;
        }
    }
    Ok(resolution)
}

fn resolve_type(ty: &FieldType, field: &Field, path: String) -> Result<Resolution, ArgError> {
    let default = field
        .default_value()
        .map_err(|reason| ArgError::InvalidValue {
            key: path.clone(),
            reason,
        })?;
    let flag = |kind, arity, default: Option<Value>| {
        Resolution::Flag(FlagSpec {
            required: default.is_none(),
            path: path.clone(),
            kind,
            arity,
            default,
            negation: None,
            help: field.help_text().map(str::to_string),
            value_name: field.value_name_hint().map(str::to_string),
            group: None,
        })
    };

    let resolution = match ty {
        FieldType::Union(_) | FieldType::Null => {
            return Err(ArgError::UnsupportedUnionType {
                field: path.clone(),
            });
        }
        FieldType::Enum(choices) => flag(ValueKind::Choice(choices.clone()), Arity::One, default),
        FieldType::Nested(schema) => Resolution::Recurse {
            schema: *schema,
            path: path.clone(),
        },
        ty if ty.is_bool() => {
            let default = default
                .filter(|v| !v.is_null())
                .unwrap_or(Value::Bool(false));
            let negate = default == Value::Bool(true);
            let mut resolution = flag(ValueKind::Bool, Arity::ZeroOrOne, Some(default));
            if negate && let Resolution::Flag(spec) = &mut resolution {
                spec.negation = Some(format!("no_{path}"));
            }
            resolution
        }
        FieldType::Optional(inner) => return resolve_type(inner, field, path.clone()),
        FieldType::Sequence(inner) => match element_kind(inner) {
            Some(kind) => flag(kind, Arity::OneOrMore, default),
            None => Resolution::Skip,
        },
        FieldType::Mapping(_) => Resolution::Skip,
        FieldType::Scalar(scalar) => flag(scalar_kind(*scalar), Arity::One, default),
    };
    Ok(resolution)
}

fn scalar_kind(scalar: Scalar) -> ValueKind {
    match scalar {
        Scalar::Bool => ValueKind::Bool,
        Scalar::Int => ValueKind::Int,
        Scalar::Float => ValueKind::Float,
        Scalar::Str => ValueKind::Str,
    }
}

fn element_kind(element: &FieldType) -> Option<ValueKind> {
    match element {
        FieldType::Scalar(scalar) => Some(scalar_kind(*scalar)),
        FieldType::Enum(choices) => Some(ValueKind::Choice(choices.clone())),
        _ => None,
    }
}

/// Parse a case-insensitive truthy/falsy token.
pub fn string_to_bool(key: &str, raw: &str) -> Result<bool, ArgError> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        _ => Err(ArgError::InvalidValue {
            key: key.to_string(),
            reason: format!(
                "Truthy value expected: got {raw} but expected one of yes/no, true/false, \
                 t/f, y/n, 1/0 (case insensitive)."
            ),
        }),
    }
}

impl FlagSpec {
    /// Coerce a single raw token.
    pub fn coerce(&self, raw: &str) -> Result<Value, ArgError> {
        coerce_as(&self.kind, &self.path, raw)
    }

    /// Coerce every raw value the flag received, honoring its arity.
    pub fn coerce_all(&self, raws: &[String]) -> Result<Value, ArgError> {
        match self.arity {
            Arity::OneOrMore => raws
                .iter()
                .map(|raw| self.coerce(raw))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Arity::ZeroOrOne if raws.is_empty() => Ok(Value::Bool(true)),
            Arity::One | Arity::ZeroOrOne => match raws.last() {
                Some(raw) => self.coerce(raw),
                None => Err(ArgError::InvalidValue {
                    key: self.path.clone(),
                    reason: "a value is required".into(),
                }),
            },
        }
    }

    pub fn choices(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::Choice(choices) => Some(choices),
            _ => None,
        }
    }

    /// Help line: declared text, choices, and the required/default marker.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(help) = &self.help {
            parts.push(help.clone());
        }
        if let Some(choices) = self.choices() {
            let names: Vec<String> = choices.iter().map(plain).collect();
            parts.push(format!("{{{}}}", names.join(", ")));
        }
        if self.required {
            parts.push("[required]".into());
        } else if let Some(default) = &self.default {
            parts.push(format!("[default: {}]", plain(default)));
        }
        parts.join(" ")
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_as(kind: &ValueKind, key: &str, raw: &str) -> Result<Value, ArgError> {
    let invalid = |reason: String| ArgError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    match kind {
        ValueKind::Bool => string_to_bool(key, raw).map(Value::Bool),
        ValueKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(format!("expected an integer, got '{raw}'"))),
        ValueKind::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid(format!("expected a finite number, got '{raw}'"))),
        ValueKind::Str => Ok(Value::String(raw.to_string())),
        ValueKind::Choice(choices) => {
            let parsed = match choices.first() {
                Some(Value::Bool(_)) => coerce_as(&ValueKind::Bool, key, raw)?,
                Some(Value::Number(n)) if n.is_f64() => coerce_as(&ValueKind::Float, key, raw)?,
                Some(Value::Number(_)) => coerce_as(&ValueKind::Int, key, raw)?,
                _ => Value::String(raw.to_string()),
            };
            if choices.contains(&parsed) {
                Ok(parsed)
            } else {
                let names: Vec<String> = choices.iter().map(plain).collect();
                Err(invalid(format!(
                    "'{raw}' is not one of: {}",
                    names.join(", ")
                )))
            }
        }
    }
}
