//! Name resolution for test library imports.
//!
//! A [`Namespace`] is the set of top-level items a library name is resolved
//! against. Items can be added programmatically or submitted at compile time
//! with [`inventory`]:
//!
//! ```ignore
//! fn build() -> keyrack_core::Item {
//!     keyrack_core::ClassDef::new("Greeter").into()
//! }
//!
//! keyrack_core::__private::inventory::submit! {
//!     keyrack_core::LibraryRegistration::new("Greeter", build)
//! }
//! ```

use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

use crate::source::{ClassDef, Item, ModuleDef};

/// Reasons a library name does not resolve to a usable source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("no module named '{0}'")]
    NoModule(String),

    #[error("module '{module}' does not contain '{item}'")]
    NotContained { module: String, item: String },

    #[error("expected class or module, got <{0}>")]
    InvalidType(&'static str),
}

/// What a library name resolved to.
#[derive(Debug, Clone)]
pub enum Source {
    Class(Arc<ClassDef>),
    Module(Arc<ModuleDef>),
}

/// A top-level item submitted at compile time.
#[derive(Debug)]
pub struct LibraryRegistration {
    name: &'static str,
    build: fn() -> Item,
}

impl LibraryRegistration {
    pub const fn new(name: &'static str, build: fn() -> Item) -> Self {
        Self { name, build }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

inventory::collect!(LibraryRegistration);

/// The import system libraries are resolved against.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    items: BTreeMap<String, Item>,
}

impl Namespace {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a namespace from every [`LibraryRegistration`] linked into the
    /// binary.
    #[must_use]
    pub fn registered() -> Self {
        let mut namespace = Self::new();
        for registration in inventory::iter::<LibraryRegistration>() {
            debug!(name = registration.name, "Collected registered library source");
            namespace.insert(registration.name, (registration.build)());
        }
        namespace
    }

    /// Adds a top-level module, keyed by its path.
    #[must_use]
    pub fn with_module(mut self, module: ModuleDef) -> Self {
        let key = module.path().to_string();
        self.insert(key, Item::from(module));
        self
    }

    /// Adds a top-level class, keyed by its name.
    #[must_use]
    pub fn with_class(mut self, class: ClassDef) -> Self {
        let key = class.name().to_string();
        self.insert(key, Item::from(class));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, item: Item) {
        self.items.insert(name.into(), item);
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolves a simple or dotted library name.
    ///
    /// A module that contains a class named like the module's last segment
    /// resolves to that class.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when the first segment is unknown, a later
    /// segment is not contained in the module before it, or the final item is
    /// neither a class nor a module.
    pub fn resolve(&self, name: &str) -> Result<Source, ResolveError> {
        let segments: Vec<&str> = name.split('.').collect();
        let Some((first, rest)) = segments.split_first() else {
            return Err(ResolveError::NoModule(name.to_string()));
        };

        let mut current = self
            .items
            .get(*first)
            .ok_or_else(|| ResolveError::NoModule((*first).to_string()))?;
        let mut path = (*first).to_string();

        for segment in rest {
            let next = match current {
                Item::Module(module) => module.item(segment),
                _ => None,
            };
            current = next.ok_or_else(|| ResolveError::NotContained {
                module: path.clone(),
                item: (*segment).to_string(),
            })?;
            path.push('.');
            path.push_str(segment);
        }

        match current {
            Item::Class(class) => Ok(Source::Class(Arc::clone(class))),
            Item::Module(module) => match module.item(module.name()) {
                Some(Item::Class(class)) => Ok(Source::Class(Arc::clone(class))),
                _ => Ok(Source::Module(Arc::clone(module))),
            },
            other => Err(ResolveError::InvalidType(other.kind_name())),
        }
    }
}
