//! Schema declarations: the traits a type implements to become an argument
//! schema, and the [`Field`] descriptor each schema lists its fields with.
//!
//! A schema is an ordinary serde struct plus an [`ArgSchema`] impl that
//! describes its fields once:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct TrainArgs {
//!     lr: f64,
//!     tags: Vec<String>,
//!     env: EnvArgs,
//! }
//!
//! impl ArgSchema for TrainArgs {
//!     fn fields() -> Vec<Field> {
//!         vec![
//!             Field::of::<f64>("lr").default(1e-4).help("learning rate"),
//!             Field::of::<Vec<String>>("tags").default_factory(Vec::<String>::new),
//!             Field::nested::<EnvArgs>("env"),
//!         ]
//!     }
//! }
//! ```
//!
//! The field list must mirror the struct: every struct field appears once,
//! under its serialized name.

use std::any::TypeId;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{FieldDefault, FieldType, Scalar};

/// The "is an argument schema" capability.
pub trait ArgSchema: Serialize + DeserializeOwned + 'static {
    /// Declared fields, in flag registration order.
    fn fields() -> Vec<Field>;

    /// Help heading the schema's flags are listed under.
    fn group() -> Option<&'static str> {
        None
    }
}

/// Maps a Rust field type to its [`FieldType`] tag.
pub trait ArgValue {
    fn field_type() -> FieldType;
}

/// An enumerated type whose serialized variants are the allowed choices.
pub trait ArgEnum: Serialize + Sized + 'static {
    fn variants() -> &'static [Self];
}

macro_rules! scalar_arg_value {
    ($kind:ident => $($ty:ty),+) => {
        $(
            impl ArgValue for $ty {
                fn field_type() -> FieldType {
                    FieldType::Scalar(Scalar::$kind)
                }
            }
        )+
    };
}

scalar_arg_value!(Bool => bool);
scalar_arg_value!(Int => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
scalar_arg_value!(Float => f32, f64);
scalar_arg_value!(Str => String, PathBuf);

impl<T: ArgValue> ArgValue for Option<T> {
    fn field_type() -> FieldType {
        FieldType::optional(T::field_type())
    }
}

impl<T: ArgValue> ArgValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::sequence(T::field_type())
    }
}

/// Type-erased handle to an [`ArgSchema`] implementor.
#[derive(Clone, Copy)]
pub struct SchemaRef {
    name: &'static str,
    type_id: TypeId,
    fields: fn() -> Vec<Field>,
    group: fn() -> Option<&'static str>,
}

impl SchemaRef {
    pub fn of<S: ArgSchema>() -> Self {
        Self {
            name: std::any::type_name::<S>(),
            type_id: TypeId::of::<S>(),
            fields: S::fields,
            group: S::group,
        }
    }

    /// Unqualified type name.
    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn fields(&self) -> Vec<Field> {
        (self.fields)()
    }

    pub fn group(&self) -> Option<&'static str> {
        (self.group)()
    }
}

impl PartialEq for SchemaRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaRef({})", self.name())
    }
}

/// One declared field: name, type tag, default and CLI metadata.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) default: Option<FieldDefault>,
    /// Why the declaration is unusable; reported at registration.
    pub(crate) error: Option<String>,
    help: Option<String>,
    value_name: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            error: None,
            help: None,
            value_name: None,
        }
    }

    /// A scalar, `Option` or `Vec` field, typed by `T`.
    pub fn of<T: ArgValue>(name: impl Into<String>) -> Self {
        Self::new(name, T::field_type())
    }

    pub fn nested<S: ArgSchema>(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Nested(SchemaRef::of::<S>()))
    }

    /// A string-keyed map of `S` values.
    pub fn map_of<S: ArgSchema>(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Mapping(SchemaRef::of::<S>()))
    }

    /// A list of `S` values.
    pub fn seq_of<S: ArgSchema>(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::sequence(FieldType::Nested(SchemaRef::of::<S>())),
        )
    }

    pub fn enumeration<E: ArgEnum>(name: impl Into<String>) -> Self {
        let choices = E::variants()
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>();
        match choices {
            Ok(choices) => Self::new(name, FieldType::Enum(choices)),
            Err(e) => {
                let mut field = Self::new(name, FieldType::Enum(Vec::new()));
                field.error = Some(format!("enum variant does not serialize: {e}"));
                field
            }
        }
    }

    /// Set a fixed default. A value that fails to serialize makes
    /// registration fail for this field.
    pub fn default(mut self, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.default = Some(FieldDefault::Value(value)),
            Err(e) => {
                self.default = None;
                self.error = Some(format!("default does not serialize: {e}"));
            }
        }
        self
    }

    /// Set a default produced fresh for every construction.
    pub fn default_factory<F, V>(mut self, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Serialize,
    {
        self.default = Some(FieldDefault::Factory(Arc::new(move || {
            serde_json::to_value(factory())
                .map_err(|e| format!("default factory output does not serialize: {e}"))
        })));
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Placeholder shown for the flag's value in help output.
    pub fn value_name(mut self, name: impl Into<String>) -> Self {
        self.value_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn default_source(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    /// The default value, if one is declared. Fails when a default factory
    /// produces a value with no JSON form.
    pub fn default_value(&self) -> Result<Option<Value>, String> {
        self.default.as_ref().map(FieldDefault::produce).transpose()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn value_name_hint(&self) -> Option<&str> {
        self.value_name.as_deref()
    }

    /// Underscore-prefixed fields never become flags and are left out of
    /// the public attribute view.
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }
}
