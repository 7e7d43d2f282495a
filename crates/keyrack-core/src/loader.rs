//! Test library loading.
//!
//! The loader resolves a library name against its [`Namespace`], picks the
//! library shape and builds a [`TestLibrary`] from it.

use tracing::{info, instrument};

use crate::{
    arguments::ArgumentError,
    config::Config,
    library::{TestLibrary, class, dynamic, module},
    namespace::{Namespace, ResolveError, Source},
    object::CallError,
};

/// Errors that can occur when loading a test library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The name does not resolve to a class or module.
    #[error("importing test library '{name}' failed: {source}")]
    Import { name: String, source: ResolveError },

    /// Library arguments do not fit the initializer.
    #[error("importing test library '{name}' failed: initializer {source}")]
    Arity {
        name: String,
        source: ArgumentError,
    },

    /// Arguments given to a module library.
    #[error("module library '{name}' does not accept arguments, got {count}")]
    ModuleArguments { name: String, count: usize },

    /// The constructor failed.
    #[error("initializing test library '{name}' failed: {source}")]
    Construction { name: String, source: CallError },

    /// A dynamic library could not list its keywords.
    #[error("getting keyword names from test library '{name}' failed: {reason}")]
    KeywordNames { name: String, reason: String },
}

/// Front door for importing test libraries.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    namespace: Namespace,
}

impl LibraryLoader {
    /// Creates a loader over every registered library source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_namespace(Namespace::registered())
    }

    #[must_use]
    pub fn with_namespace(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Loads a library without arguments.
    ///
    /// # Errors
    ///
    /// See [`LibraryLoader::load_with_args`].
    pub fn load(&self, name: &str) -> Result<TestLibrary, LoadError> {
        self.load_with_args(name, Vec::<String>::new())
    }

    /// Loads a library by simple or dotted name with positional arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the name does not resolve, a module gets
    /// arguments, a global library cannot be instantiated, or a dynamic
    /// library cannot list its keywords.
    #[instrument(skip(self, args))]
    pub fn load_with_args<I, S>(&self, name: &str, args: I) -> Result<TestLibrary, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let source = self
            .namespace
            .resolve(name)
            .map_err(|source| LoadError::Import {
                name: name.to_string(),
                source,
            })?;

        info!(library = name, args = args.len(), "Importing test library");

        let library = match &source {
            Source::Module(source) => module::load(name, source, args)?,
            Source::Class(source) if dynamic::is_dynamic(source) => {
                dynamic::load(name, source, args)?
            }
            Source::Class(source) => class::load(name, source, args)?,
        };

        info!(
            library = name,
            kind = %library.kind(),
            scope = %library.scope(),
            keywords = library.len(),
            "Loaded test library"
        );
        Ok(library)
    }

    /// Loads every enabled library of `config`, in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`LoadError`] encountered.
    pub fn load_configured(&self, config: &Config) -> Result<Vec<TestLibrary>, LoadError> {
        config
            .enabled_libraries()
            .map(|library| self.load_with_args(&library.name, library.args.iter().cloned()))
            .collect()
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}
