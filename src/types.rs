use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::schema::SchemaRef;

/// Leaf value kinds a field (and its flag) can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    Int,
    Float,
    Str,
}

/// Declared type of a schema field.
///
/// A closed set: every field is one of these shapes, and the flag derived
/// from it is decided by the shape alone.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// `bool`, integers, floats, strings.
    Scalar(Scalar),
    /// A closed set of values; the serialized form of each enum variant.
    Enum(Vec<Value>),
    /// `Option<X>`.
    Optional(Box<FieldType>),
    /// `Vec<X>`. With a nested schema as `X` this is a sequence of schemas.
    Sequence(Box<FieldType>),
    /// String keys to nested schema values.
    Mapping(SchemaRef),
    /// A nested schema.
    Nested(SchemaRef),
    /// Any union of types. Only `X | None` is accepted at registration.
    Union(Vec<FieldType>),
    /// The none type, meaningful only as a union member.
    Null,
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn sequence(inner: FieldType) -> Self {
        FieldType::Sequence(Box::new(inner))
    }

    /// `bool` or `Option<bool>`.
    pub fn is_bool(&self) -> bool {
        match self {
            FieldType::Scalar(Scalar::Bool) => true,
            FieldType::Optional(inner) => matches!(**inner, FieldType::Scalar(Scalar::Bool)),
            _ => false,
        }
    }

    /// Schemas referenced directly by this type (not transitively).
    pub fn schema_refs(&self) -> Vec<SchemaRef> {
        match self {
            FieldType::Nested(schema) | FieldType::Mapping(schema) => vec![*schema],
            FieldType::Optional(inner) | FieldType::Sequence(inner) => inner.schema_refs(),
            FieldType::Union(members) => members.iter().flat_map(FieldType::schema_refs).collect(),
            _ => vec![],
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(Scalar::Bool) => write!(f, "bool"),
            FieldType::Scalar(Scalar::Int) => write!(f, "int"),
            FieldType::Scalar(Scalar::Float) => write!(f, "float"),
            FieldType::Scalar(Scalar::Str) => write!(f, "str"),
            FieldType::Enum(_) => write!(f, "enum"),
            FieldType::Optional(inner) => write!(f, "Option<{inner}>"),
            FieldType::Sequence(inner) => write!(f, "Vec<{inner}>"),
            FieldType::Mapping(schema) => write!(f, "Map<str, {}>", schema.name()),
            FieldType::Nested(schema) => write!(f, "{}", schema.name()),
            FieldType::Union(members) => {
                let names: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "Union<{}>", names.join(", "))
            }
            FieldType::Null => write!(f, "None"),
        }
    }
}

/// Where a field's value comes from when no source supplies one.
#[derive(Clone)]
pub enum FieldDefault {
    /// A fixed value.
    Value(Value),
    /// Called on every construction; use for collections. Fails with the
    /// reason the produced value could not be serialized.
    Factory(Arc<dyn Fn() -> Result<Value, String> + Send + Sync>),
    /// An empty nested schema, filled from its own defaults.
    EmptySchema,
}

impl FieldDefault {
    pub fn produce(&self) -> Result<Value, String> {
        match self {
            FieldDefault::Value(v) => Ok(v.clone()),
            FieldDefault::Factory(f) => f(),
            FieldDefault::EmptySchema => Ok(Value::Object(Map::new())),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
            FieldDefault::EmptySchema => f.write_str("EmptySchema"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::EnvArgs;
    use serde_json::json;

    #[test]
    fn bool_and_optional_bool_are_bool() {
        assert!(FieldType::Scalar(Scalar::Bool).is_bool());
        assert!(FieldType::optional(FieldType::Scalar(Scalar::Bool)).is_bool());
        assert!(!FieldType::optional(FieldType::Scalar(Scalar::Int)).is_bool());
    }

    #[test]
    fn schema_refs_see_through_wrappers() {
        let schema = SchemaRef::of::<EnvArgs>();
        let ty = FieldType::optional(FieldType::sequence(FieldType::Nested(schema)));
        assert_eq!(ty.schema_refs(), vec![schema]);
        assert!(FieldType::Scalar(Scalar::Str).schema_refs().is_empty());
    }

    #[test]
    fn display_names_types() {
        let ty = FieldType::Union(vec![FieldType::Scalar(Scalar::Int), FieldType::Scalar(Scalar::Str)]);
        assert_eq!(ty.to_string(), "Union<int, str>");
        assert_eq!(
            FieldType::sequence(FieldType::Scalar(Scalar::Float)).to_string(),
            "Vec<float>"
        );
    }

    #[test]
    fn factory_runs_each_time() {
        let default = FieldDefault::Factory(Arc::new(|| Ok(json!([]))));
        assert_eq!(default.produce().unwrap(), json!([]));
        assert_eq!(default.produce().unwrap(), json!([]));
        assert_eq!(FieldDefault::EmptySchema.produce().unwrap(), json!({}));
    }
}
