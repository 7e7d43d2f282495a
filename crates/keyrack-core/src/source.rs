//! Declarations of library sources: classes, modules and their members.
//!
//! These are the shapes a library name can resolve to. A [`ClassDef`] is
//! instantiated into backing instances; a [`ModuleDef`] is its own single
//! instance.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde_json::Value;

use crate::{
    arguments::Signature,
    object::{
        Arguments, Attribute, CallError, Callable, Instance, LibraryObject, Object, callable,
        value_kind,
    },
};

/// Builds a fresh backing instance from positional library arguments.
pub type Constructor = Arc<dyn Fn(&[String]) -> Result<Instance, CallError> + Send + Sync>;

/// A method declared on a class.
#[derive(Clone)]
pub struct MethodDef {
    name: String,
    signature: Option<Signature>,
    doc: String,
    body: Option<Callable>,
}

impl MethodDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signature: Some(Signature::method()),
            doc: String::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Marks the parameters as unknown, so any arguments are accepted.
    #[must_use]
    pub fn without_signature(mut self) -> Self {
        self.signature = None;
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Sets the body installed on default-constructed instances.
    #[must_use]
    pub fn with_body<F>(self, f: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.with_callable(callable(f))
    }

    /// Sets an existing callable as the body, e.g. to alias another method.
    #[must_use]
    pub fn with_callable(mut self, body: Callable) -> Self {
        self.body = Some(body);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters, `None` when unknown.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn body(&self) -> Option<&Callable> {
        self.body.as_ref()
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

/// A class initializer.
#[derive(Debug, Clone, Default)]
pub struct InitDef {
    pub signature: Signature,
    pub doc: String,
}

/// A class that can act as a test library.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    doc: String,
    attributes: BTreeMap<String, Attribute>,
    methods: Vec<MethodDef>,
    init: Option<InitDef>,
    constructor: Option<Constructor>,
}

impl ClassDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            attributes: BTreeMap::new(),
            methods: Vec::new(),
            init: None,
            constructor: None,
        }
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Adds a class-level data attribute, such as library metadata.
    #[must_use]
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_attribute(name, Attribute::Value(value.into()))
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Declares a method. Declaration order is discovery order.
    #[must_use]
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn with_init(mut self, signature: Signature, doc: impl Into<String>) -> Self {
        self.init = Some(InitDef {
            signature,
            doc: doc.into(),
        });
        self
    }

    /// Replaces default instantiation with a custom constructor.
    #[must_use]
    pub fn with_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) -> Result<Instance, CallError> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Callable class-level attributes that are not declared as methods,
    /// in name order.
    pub fn callable_attributes(&self) -> impl Iterator<Item = (&str, &Callable)> {
        self.attributes
            .iter()
            .filter(|(name, _)| self.method(name).is_none())
            .filter_map(|(name, attribute)| Some((name.as_str(), attribute.as_callable()?)))
    }

    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn init(&self) -> Option<&InitDef> {
        self.init.as_ref()
    }

    /// Creates a new backing instance.
    ///
    /// Without a custom constructor the instance is an [`Object`] carrying
    /// the class-level attributes and every method body.
    ///
    /// # Errors
    ///
    /// Returns the constructor's error unchanged.
    pub fn instantiate(&self, args: &[String]) -> Result<Instance, CallError> {
        if let Some(constructor) = &self.constructor {
            return constructor(args);
        }
        let mut object = Object::new();
        for (name, attribute) in &self.attributes {
            object.insert(name.clone(), attribute.clone());
        }
        for method in &self.methods {
            if let Some(body) = &method.body {
                object.insert(method.name.clone(), Attribute::Callable(Arc::clone(body)));
            }
        }
        Ok(Arc::new(object))
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("methods", &self.methods)
            .field("init", &self.init)
            .field("custom_constructor", &self.constructor.is_some())
            .finish_non_exhaustive()
    }
}

/// A function defined in (or imported into) a module.
#[derive(Clone)]
pub struct FunctionDef {
    name: String,
    signature: Option<Signature>,
    doc: String,
    module: Option<String>,
    body: Callable,
}

impl FunctionDef {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Some(Signature::new()),
            doc: String::new(),
            module: None,
            body: callable(f),
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Marks the parameters as unknown, so any arguments are accepted.
    #[must_use]
    pub fn without_signature(mut self) -> Self {
        self.signature = None;
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Marks the module the function was originally defined in.
    #[must_use]
    pub fn defined_in(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Dotted path of the defining module.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn body(&self) -> &Callable {
        &self.body
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

/// A named member of a module or of the top-level namespace.
#[derive(Debug, Clone)]
pub enum Item {
    Module(Arc<ModuleDef>),
    Class(Arc<ClassDef>),
    Function(FunctionDef),
    Value(Value),
}

impl Item {
    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Module(_) => "module",
            Self::Class(_) => "class",
            Self::Function(_) => "function",
            Self::Value(value) => value_kind(value),
        }
    }
}

impl From<ModuleDef> for Item {
    fn from(module: ModuleDef) -> Self {
        Self::Module(Arc::new(module))
    }
}

impl From<ClassDef> for Item {
    fn from(class: ClassDef) -> Self {
        Self::Class(Arc::new(class))
    }
}

/// An importable namespace.
#[derive(Debug, Clone)]
pub struct ModuleDef {
    path: String,
    doc: String,
    items: BTreeMap<String, Item>,
}

impl ModuleDef {
    /// Creates a module with its full dotted path, e.g. `"pkg.sub"`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            doc: String::new(),
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Defines a function in this module.
    #[must_use]
    pub fn with_function(mut self, function: FunctionDef) -> Self {
        let function = if function.module.is_some() {
            function
        } else {
            function.defined_in(self.path.clone())
        };
        self.items
            .insert(function.name.clone(), Item::Function(function));
        self
    }

    /// Imports a function from elsewhere under `alias`, keeping its origin.
    #[must_use]
    pub fn with_import(mut self, alias: impl Into<String>, function: FunctionDef) -> Self {
        self.items.insert(alias.into(), Item::Function(function));
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.items.insert(class.name.clone(), Item::from(class));
        self
    }

    /// Adds a submodule, keyed by the last segment of its path.
    #[must_use]
    pub fn with_submodule(mut self, module: ModuleDef) -> Self {
        let key = module.name().to_string();
        self.items.insert(key, Item::from(module));
        self
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.items.insert(name.into(), Item::Value(value.into()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the dotted path.
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.items.iter().map(|(name, item)| (name.as_str(), item))
    }
}

impl LibraryObject for ModuleDef {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        match self.items.get(name)? {
            Item::Function(function) => Some(Attribute::Callable(Arc::clone(&function.body))),
            Item::Value(value) => Some(Attribute::Value(value.clone())),
            Item::Module(_) | Item::Class(_) => None,
        }
    }
}
