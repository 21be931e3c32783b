//! Schema registration and construction from plain value trees.
//!
//! [`register`] validates a schema declaration and every schema reachable
//! from it in one pass: unique field names, only `Option<X>` unions,
//! serializable defaults and choices, no schema nested inside itself. It also
//! gives every nested-schema field without a default an empty-schema
//! default, so a nested schema is never absent after construction.
//!
//! [`construct`] is the construction hook. It walks the value tree alongside
//! the schema, fills defaults, materializes nested-schema, map-of-schema
//! and list-of-schema values recursively and checks the shape of every leaf
//! before serde builds the typed struct.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ArgError;
use crate::flatten::dotted;
use crate::schema::{ArgSchema, Field, SchemaRef};
use crate::types::{FieldDefault, FieldType, Scalar};

/// A registered schema: validated fields with registration defaults applied.
///
/// Every schema reachable from the registered root shares one table, so
/// nested schemas are looked up rather than registered again.
#[derive(Debug, Clone)]
pub struct Schema {
    source: SchemaRef,
    registered: Arc<HashMap<TypeId, Vec<Field>>>,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        self.source.name()
    }

    pub fn group(&self) -> Option<&'static str> {
        self.source.group()
    }

    pub fn fields(&self) -> &[Field] {
        self.registered
            .get(&self.source.type_id())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name() == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// A schema reachable from this one, from the shared table.
    pub fn nested(&self, schema: SchemaRef) -> Option<Schema> {
        self.registered
            .contains_key(&schema.type_id())
            .then(|| Schema {
                source: schema,
                registered: Arc::clone(&self.registered),
            })
    }

    /// Like [`Schema::nested`], registering `schema` when it is not reachable.
    pub(crate) fn nested_or_register(&self, schema: SchemaRef) -> Result<Schema, ArgError> {
        match self.nested(schema) {
            Some(nested) => Ok(nested),
            None => register_ref(schema),
        }
    }
}

/// Register `S` as an argument schema.
pub fn register<S: ArgSchema>() -> Result<Schema, ArgError> {
    register_ref(SchemaRef::of::<S>())
}

/// Register a schema through its type-erased handle.
pub fn register_ref(schema: SchemaRef) -> Result<Schema, ArgError> {
    let mut registered = HashMap::new();
    register_inner(schema, "", &mut Vec::new(), &mut registered)?;
    Ok(Schema {
        source: schema,
        registered: Arc::new(registered),
    })
}

fn register_inner(
    schema: SchemaRef,
    path: &str,
    stack: &mut Vec<TypeId>,
    registered: &mut HashMap<TypeId, Vec<Field>>,
) -> Result<(), ArgError> {
    if stack.contains(&schema.type_id()) {
        return Err(ArgError::CyclicSchema(schema.name().to_string()));
    }
    if registered.contains_key(&schema.type_id()) {
        return Ok(());
    }
    stack.push(schema.type_id());

    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for mut field in schema.fields() {
        if !seen.insert(field.name.clone()) {
            return Err(ArgError::DuplicateField {
                schema: schema.name().to_string(),
                field: field.name.clone(),
            });
        }

        let field_path = dotted(path, &field.name);
        if let Some(reason) = field.error.take() {
            return Err(ArgError::InvalidValue {
                key: field_path,
                reason,
            });
        }
        if let Some(default) = &field.default {
            default.produce().map_err(|reason| ArgError::InvalidValue {
                key: field_path.clone(),
                reason,
            })?;
        }

        field.ty = normalize(field.ty, &field_path)?;
        for nested in field.ty.schema_refs() {
            register_inner(nested, &field_path, stack, registered)?;
        }

        if matches!(field.ty, FieldType::Nested(_)) && field.default.is_none() {
            field.default = Some(FieldDefault::EmptySchema);
        }
        fields.push(field);
    }

    stack.pop();
    registered.insert(schema.type_id(), fields);
    Ok(())
}

/// Collapse `X | None` into `Option<X>`; reject every other union.
fn normalize(ty: FieldType, path: &str) -> Result<FieldType, ArgError> {
    match ty {
        FieldType::Union(members) => {
            let (nulls, mut concrete): (Vec<_>, Vec<_>) =
                members.into_iter().partition(|m| *m == FieldType::Null);
            if nulls.len() == 1 && concrete.len() == 1 {
                let inner = concrete.remove(0);
                Ok(FieldType::optional(normalize(inner, path)?))
            } else {
                Err(ArgError::UnsupportedUnionType {
                    field: path.to_string(),
                })
            }
        }
        FieldType::Null => Err(ArgError::UnsupportedUnionType {
            field: path.to_string(),
        }),
        FieldType::Optional(inner) => Ok(FieldType::optional(normalize(*inner, path)?)),
        FieldType::Sequence(inner) => Ok(FieldType::sequence(normalize(*inner, path)?)),
        other => Ok(other),
    }
}

/// Build `S` from a nested value tree.
///
/// With `strict`, keys that name no declared field fail with
/// [`ArgError::UnknownField`]; otherwise they are dropped. A value of the
/// wrong shape fails with [`ArgError::InvalidValue`] keyed by its dotted path.
pub fn construct<S: ArgSchema>(values: Map<String, Value>, strict: bool) -> Result<S, ArgError> {
    let schema = register::<S>()?;
    let tree = materialize(&schema, values, "", strict)?;
    serde_json::from_value(Value::Object(tree)).map_err(|e| ArgError::InvalidValue {
        key: schema.name().to_string(),
        reason: e.to_string(),
    })
}

fn materialize(
    schema: &Schema,
    mut values: Map<String, Value>,
    path: &str,
    strict: bool,
) -> Result<Map<String, Value>, ArgError> {
    let mut out = Map::new();
    for field in schema.fields() {
        let field_path = dotted(path, field.name());
        let raw = match values.remove(field.name()) {
            Some(value) => value,
            None => default_for(field, &field_path)?,
        };
        let value = promote(schema, field.ty(), raw, &field_path, strict)?;
        check_shape(field.ty(), &value, &field_path)?;
        out.insert(field.name().to_string(), value);
    }

    if strict && let Some(unknown) = values.keys().next() {
        return Err(ArgError::UnknownField(dotted(path, unknown)));
    }
    Ok(out)
}

fn default_for(field: &Field, path: &str) -> Result<Value, ArgError> {
    match field.default_source() {
        Some(default) => default.produce().map_err(|reason| ArgError::InvalidValue {
            key: path.to_string(),
            reason,
        }),
        None if field.ty().is_bool() => Ok(Value::Bool(false)),
        None => Err(ArgError::MissingRequiredField(path.to_string())),
    }
}

/// Turn plain maps in schema-typed positions into materialized schema trees.
/// Values of any other shape pass through to [`check_shape`].
fn promote(
    parent: &Schema,
    ty: &FieldType,
    value: Value,
    path: &str,
    strict: bool,
) -> Result<Value, ArgError> {
    match (ty, value) {
        (FieldType::Nested(schema), Value::Object(map)) => {
            let schema = parent.nested_or_register(*schema)?;
            Ok(Value::Object(materialize(&schema, map, path, strict)?))
        }
        (FieldType::Optional(inner), value) if !value.is_null() => {
            promote(parent, inner, value, path, strict)
        }
        (FieldType::Mapping(schema), Value::Object(entries)) => {
            let schema = parent.nested_or_register(*schema)?;
            let mut out = Map::new();
            for (key, entry) in entries {
                let entry_path = dotted(path, &key);
                let entry = match entry {
                    Value::Object(map) => {
                        Value::Object(materialize(&schema, map, &entry_path, strict)?)
                    }
                    other => other,
                };
                out.insert(key, entry);
            }
            Ok(Value::Object(out))
        }
        (FieldType::Sequence(inner), Value::Array(items))
            if matches!(**inner, FieldType::Nested(_)) =>
        {
            let promoted = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| promote(parent, inner, item, &format!("{path}[{i}]"), strict))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(promoted))
        }
        (_, value) => Ok(value),
    }
}

/// Check that `value` has the JSON shape `ty` deserializes from.
fn check_shape(ty: &FieldType, value: &Value, path: &str) -> Result<(), ArgError> {
    let fits = match (ty, value) {
        (FieldType::Optional(_), Value::Null) => true,
        (FieldType::Optional(inner), value) => return check_shape(inner, value, path),
        (FieldType::Sequence(inner), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_shape(inner, item, &format!("{path}[{i}]"))?;
            }
            true
        }
        (FieldType::Mapping(schema), Value::Object(entries)) => {
            for (key, entry) in entries {
                if !entry.is_object() {
                    let entry_ty = FieldType::Nested(*schema);
                    return Err(shape_error(&entry_ty, entry, &dotted(path, key)));
                }
            }
            true
        }
        (FieldType::Scalar(Scalar::Bool), value) => value.is_boolean(),
        (FieldType::Scalar(Scalar::Int), value) => value.is_i64() || value.is_u64(),
        (FieldType::Scalar(Scalar::Float), value) => value.is_number(),
        (FieldType::Scalar(Scalar::Str), value) => value.is_string(),
        (FieldType::Enum(choices), value) => choices.iter().any(|c| same_choice(c, value)),
        (FieldType::Nested(_), value) => value.is_object(),
        (FieldType::Sequence(_) | FieldType::Mapping(_), _) => false,
        (FieldType::Union(_) | FieldType::Null, _) => true,
    };
    if fits {
        Ok(())
    } else {
        Err(shape_error(ty, value, path))
    }
}

fn shape_error(ty: &FieldType, value: &Value, path: &str) -> ArgError {
    let reason = match ty {
        FieldType::Enum(choices) => {
            let names: Vec<String> = choices.iter().map(Value::to_string).collect();
            format!("{value} is not one of: {}", names.join(", "))
        }
        ty => format!("expected {ty}, got {value}"),
    };
    ArgError::InvalidValue {
        key: path.to_string(),
        reason,
    }
}

/// Numbers compare by value, so a file's `1` matches a choice of `1.0`.
fn same_choice(choice: &Value, value: &Value) -> bool {
    match (choice, value) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        _ => choice == value,
    }
}

/// Convert a schema instance back to a plain value tree.
pub fn to_plain_dict<S: Serialize>(instance: &S) -> Result<Map<String, Value>, ArgError> {
    let value = serde_json::to_value(instance).map_err(|e| ArgError::InvalidValue {
        key: "<instance>".into(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ArgError::InvalidValue {
            key: "<instance>".into(),
            reason: format!("expected a struct, serialized to {other}"),
        }),
    }
}

/// Like [`to_plain_dict`] without the top-level private fields.
pub fn public_attributes<S: ArgSchema>(instance: &S) -> Result<Map<String, Value>, ArgError> {
    let mut map = to_plain_dict(instance)?;
    map.retain(|key, _| !key.starts_with('_'));
    Ok(map)
}
