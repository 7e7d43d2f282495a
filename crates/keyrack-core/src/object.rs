//! Runtime object model that test library sources are expressed in.
//!
//! Libraries are opaque to the engine: everything it learns about a backing
//! instance goes through [`LibraryObject::attribute`]. An attribute is either
//! a [`Callable`] or a plain data [`Value`], which is how "present but not
//! callable" members are told apart from real methods.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde_json::{Map, Value};

/// Error raised by user code behind a [`Callable`] or a constructor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallError {
    message: String,
}

impl CallError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Already-resolved arguments handed to a callable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    /// Positional arguments in call order.
    pub positional: Vec<Value>,
    /// Named arguments, only accepted by callables with a named bag.
    pub named: Map<String, Value>,
}

impl Arguments {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an argument list from positional values.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: Map::new(),
        }
    }

    /// Adds a named argument.
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Returns the positional argument at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }
}

/// A shared, invocable operation.
pub type Callable = Arc<dyn Fn(&Arguments) -> Result<Value, CallError> + Send + Sync>;

/// Wraps a closure into a [`Callable`].
pub fn callable<F>(f: F) -> Callable
where
    F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A member looked up on a library object.
#[derive(Clone)]
pub enum Attribute {
    /// Something that can be invoked.
    Callable(Callable),
    /// Plain data.
    Value(Value),
}

impl Attribute {
    #[must_use]
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Callable(callable) => Some(callable),
            Self::Value(_) => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Callable(_) => None,
            Self::Value(value) => Some(value),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Callable> for Attribute {
    fn from(callable: Callable) -> Self {
        Self::Callable(callable)
    }
}

/// The introspection interface every backing instance implements.
pub trait LibraryObject: Send + Sync {
    /// Looks up a member by its exact name.
    fn attribute(&self, name: &str) -> Option<Attribute>;

    /// Looks up a member and returns it only if it is callable.
    fn callable(&self, name: &str) -> Option<Callable> {
        match self.attribute(name) {
            Some(Attribute::Callable(callable)) => Some(callable),
            _ => None,
        }
    }
}

/// A backing instance handed out by a library's scope controller.
///
/// Identity is pointer identity of the `Arc`.
pub type Instance = Arc<dyn LibraryObject>;

/// A plain attribute bag, the default shape of class instances.
#[derive(Clone, Default)]
pub struct Object {
    attributes: BTreeMap<String, Attribute>,
}

impl Object {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callable member built from a closure.
    #[must_use]
    pub fn with_method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.with_attribute(name, Attribute::Callable(callable(f)))
    }

    /// Adds a plain data member.
    #[must_use]
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_attribute(name, Attribute::Value(value.into()))
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.insert(name, attribute);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) {
        self.attributes.insert(name.into(), attribute);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

impl LibraryObject for Object {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.get(name).cloned()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Short type name of a JSON value, used in error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_object_returns_callables_and_values() {
        let object = Object::new()
            .with_method("greet", |args| {
                let who = args.get(0).and_then(Value::as_str).unwrap_or("nobody");
                Ok(Value::String(format!("hello {who}")))
            })
            .with_value("version", "1.0");

        let greet = object.callable("greet").expect("greet is callable");
        assert_eq!(
            greet(&Arguments::positional(["world"])).unwrap(),
            json!("hello world")
        );
        assert_eq!(
            object.attribute("version").unwrap().as_value(),
            Some(&json!("1.0"))
        );
        assert!(object.callable("version").is_none());
        assert!(object.attribute("missing").is_none());
    }

    #[test]
    fn test_arguments_builders() {
        let args = Arguments::positional([1, 2]).with_named("level", "WARN");

        assert_eq!(args.positional, vec![json!(1), json!(2)]);
        assert_eq!(args.named.get("level"), Some(&json!("WARN")));
        assert!(Arguments::new().positional.is_empty());
    }

    #[test]
    fn test_call_error_display_is_message() {
        let err = CallError::new("boom");

        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn test_value_kind_names() {
        assert_eq!(value_kind(&json!("x")), "str");
        assert_eq!(value_kind(&json!(1)), "int");
        assert_eq!(value_kind(&json!(1.5)), "float");
        assert_eq!(value_kind(&json!(null)), "NoneType");
        assert_eq!(value_kind(&json!({"a": 1})), "dict");
    }

    #[test]
    fn test_attribute_debug_hides_callable_body() {
        let attribute = Attribute::Callable(callable(|_| Ok(Value::Null)));

        assert_eq!(format!("{attribute:?}"), "Callable(..)");
    }
}
