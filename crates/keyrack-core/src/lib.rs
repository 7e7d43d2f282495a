//! Test library loading and keyword resolution.
//!
//! This crate turns a library name into a [`TestLibrary`]: it resolves the
//! name against a [`Namespace`] of classes and modules, discovers the
//! keywords the library exposes, and manages the lifetime of the library's
//! backing instance across suite and test boundaries.
//!
//! # Key Components
//!
//! - **Loading**: [`LibraryLoader`] resolves simple and dotted names and
//!   picks the class, module or dynamic library shape
//! - **Keywords**: [`KeywordHandler`] with a normalized lookup key, an
//!   [`ArgumentSpec`] and documentation
//! - **Scopes**: [`ScopeManager`] saves and restores the backing instance
//!   for `GLOBAL`, `TESTSUITE` and `TESTCASE` libraries
//! - **Configuration**: `keyrack.toml` lists libraries to import
//!
//! # Example
//!
//! ```ignore
//! use keyrack_core::{Arguments, ClassDef, LibraryLoader, MethodDef, Namespace};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let namespace = Namespace::new().with_class(
//!     ClassDef::new("Greeter")
//!         .with_method(MethodDef::new("greet").with_body(|_| Ok(json!("hello")))),
//! );
//! let mut library = LibraryLoader::with_namespace(namespace).load("Greeter")?;
//!
//! library.start_suite();
//! library.start_test();
//! let greeting = library.run_keyword("Greet", &Arguments::new())?;
//! library.end_test()?;
//! library.end_suite()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Lifecycle operations take `&mut self` and are meant to be driven by a
//! single executor. Every object-model type is `Send + Sync`, so a loaded
//! library can be moved to another thread.

mod arguments;
mod config;
mod handler;
mod library;
mod loader;
mod namespace;
mod object;
mod scope;
mod source;

#[cfg(test)]
mod fixtures;

/// Argument arity of keywords and initializers.
pub use arguments::{ArgumentError, ArgumentSpec, Param, ParamKind, Signature};

/// Import configuration and its resolution.
pub use config::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, Config, ConfigError, ConfigFile, LibraryConfig,
};

pub use handler::{KeywordHandler, Resolution, normalize, printable_name};

/// Loaded libraries and their metadata attributes.
pub use library::{
    Documentation, InitHandler, LIBRARY_DOC_FORMAT, LIBRARY_EXCLUDES, LIBRARY_SCOPE,
    LIBRARY_VERSION, LibraryError, LibraryKind, TestLibrary,
};

pub use loader::{LibraryLoader, LoadError};

/// Name resolution and compile-time registration.
pub use namespace::{LibraryRegistration, Namespace, ResolveError, Source};

/// The object model library sources are expressed in.
pub use object::{
    Arguments, Attribute, CallError, Callable, Instance, LibraryObject, Object, callable,
};

pub use scope::{Scope, ScopeError, ScopeManager};

pub use source::{ClassDef, Constructor, FunctionDef, InitDef, Item, MethodDef, ModuleDef};

/// Re-exports used by registration code. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
