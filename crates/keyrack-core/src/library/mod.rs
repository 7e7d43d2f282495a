//! Loaded test libraries.
//!
//! A [`TestLibrary`] is what the loader hands back: library metadata, the
//! keyword handler table keyed by normalized name, and the scope controller
//! owning the backing instance. The three library shapes only differ in how
//! the table and the instance factory are built.

pub(crate) mod class;
pub(crate) mod dynamic;
pub(crate) mod module;

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, OnceLock},
};

use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    arguments::{ArgumentError, ArgumentSpec},
    handler::{KeywordHandler, normalize},
    loader::LoadError,
    object::{Arguments, Attribute, CallError, Callable, Instance},
    scope::{Scope, ScopeError, ScopeManager},
    source::ClassDef,
};

/// Declared lifetime policy.
pub const LIBRARY_SCOPE: &str = "LIBRARY_SCOPE";
/// Declared library version.
pub const LIBRARY_VERSION: &str = "LIBRARY_VERSION";
/// Declared documentation format.
pub const LIBRARY_DOC_FORMAT: &str = "LIBRARY_DOC_FORMAT";
/// Member names that are not keywords.
pub const LIBRARY_EXCLUDES: &str = "LIBRARY_EXCLUDES";

/// Errors raised while using a loaded library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LibraryError {
    /// Lazy instance creation failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("no keyword with name '{name}' found")]
    NoKeyword { library: String, name: String },

    /// Invocation arguments do not fit the keyword.
    #[error("keyword '{keyword}' {source}")]
    Arguments {
        keyword: String,
        source: ArgumentError,
    },

    /// The instance does not expose the callable the keyword resolves to.
    #[error("keyword '{keyword}' has no callable '{attribute}' on the current library instance")]
    MissingTarget { keyword: String, attribute: String },

    /// The keyword itself failed.
    #[error("keyword '{keyword}' failed: {source}")]
    Invocation { keyword: String, source: CallError },

    /// A dynamic documentation query failed.
    #[error("getting documentation of test library '{library}' failed: {source}")]
    Documentation { library: String, source: CallError },
}

/// Which shape a library was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    Class,
    Module,
    Dynamic,
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Class => "class",
            Self::Module => "module",
            Self::Dynamic => "dynamic",
        })
    }
}

/// Documentation text that may come from a dynamic query.
///
/// The query runs on the first read; its result or failure is cached.
pub struct Documentation {
    library: String,
    fallback: String,
    query: Option<(Callable, &'static str)>,
    resolved: OnceLock<Result<String, CallError>>,
}

impl Documentation {
    pub(crate) fn fixed(library: &str, doc: &str) -> Self {
        Self {
            library: library.to_string(),
            fallback: doc.to_string(),
            query: None,
            resolved: OnceLock::new(),
        }
    }

    /// A non-empty answer of `query` called with `marker` overrides `fallback`.
    pub(crate) fn dynamic(
        library: &str,
        fallback: &str,
        query: Option<Callable>,
        marker: &'static str,
    ) -> Self {
        Self {
            query: query.map(|query| (query, marker)),
            ..Self::fixed(library, fallback)
        }
    }

    /// Returns the documentation, running the dynamic query on first use.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Documentation`] if the query failed. Every
    /// later read returns the same failure.
    pub fn get(&self) -> Result<&str, LibraryError> {
        let Some((query, marker)) = &self.query else {
            return Ok(self.fallback.as_str());
        };
        let resolved = self.resolved.get_or_init(|| {
            let text = render_text(query(&Arguments::positional([*marker]))?);
            Ok(if text.is_empty() {
                self.fallback.clone()
            } else {
                text
            })
        });
        match resolved {
            Ok(doc) => Ok(doc.as_str()),
            Err(source) => Err(LibraryError::Documentation {
                library: self.library.clone(),
                source: source.clone(),
            }),
        }
    }
}

impl fmt::Debug for Documentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Documentation")
            .field("fallback", &self.fallback)
            .field("dynamic", &self.query.is_some())
            .field("resolved", &self.resolved.get())
            .finish_non_exhaustive()
    }
}

/// The library initializer as seen by documentation tools.
#[derive(Debug)]
pub struct InitHandler {
    arguments: ArgumentSpec,
    doc: Documentation,
}

impl InitHandler {
    pub fn arguments(&self) -> &ArgumentSpec {
        &self.arguments
    }

    /// # Errors
    ///
    /// Returns [`LibraryError::Documentation`] if a dynamic query failed.
    pub fn doc(&self) -> Result<&str, LibraryError> {
        self.doc.get()
    }
}

type Factory = Arc<dyn Fn() -> Result<Instance, LoadError> + Send + Sync>;

/// A loaded test library.
pub struct TestLibrary {
    name: String,
    kind: LibraryKind,
    version: String,
    doc: Documentation,
    doc_format: String,
    init: InitHandler,
    positional_args: Vec<String>,
    handlers: HashMap<String, Arc<KeywordHandler>>,
    instances: ScopeManager,
    factory: Factory,
}

impl TestLibrary {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LibraryKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scope(&self) -> Scope {
        self.instances.scope()
    }

    /// Library documentation.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Documentation`] if the dynamic intro query
    /// failed.
    pub fn doc(&self) -> Result<&str, LibraryError> {
        self.doc.get()
    }

    /// Upper-cased documentation format, empty when not declared.
    pub fn doc_format(&self) -> &str {
        &self.doc_format
    }

    pub fn init(&self) -> &InitHandler {
        &self.init
    }

    pub fn positional_args(&self) -> &[String] {
        &self.positional_args
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<KeywordHandler>> {
        self.handlers.values()
    }

    /// Number of keywords.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Looks up a handler by any spelling that normalizes to its key.
    pub fn handler(&self, name: &str) -> Option<&Arc<KeywordHandler>> {
        self.handlers.get(&normalize(name))
    }

    /// # Errors
    ///
    /// Returns [`LibraryError::NoKeyword`] if no handler matches.
    pub fn get_handler(&self, name: &str) -> Result<Arc<KeywordHandler>, LibraryError> {
        self.handler(name)
            .cloned()
            .ok_or_else(|| LibraryError::NoKeyword {
                library: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn start_suite(&mut self) {
        self.instances.start_suite();
    }

    /// # Errors
    ///
    /// Returns [`LibraryError::Scope`] if no suite is open.
    pub fn end_suite(&mut self) -> Result<(), LibraryError> {
        Ok(self.instances.end_suite()?)
    }

    pub fn start_test(&mut self) {
        self.instances.start_test();
    }

    /// # Errors
    ///
    /// Returns [`LibraryError::Scope`] if no test is open.
    pub fn end_test(&mut self) -> Result<(), LibraryError> {
        Ok(self.instances.end_test()?)
    }

    /// Returns the current backing instance, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Load`] when a lazily created instance cannot
    /// be built, e.g. because the library arguments do not fit the
    /// initializer.
    pub fn get_instance(&mut self) -> Result<Instance, LibraryError> {
        Ok(self.instances.get_or_create(self.factory.as_ref())?)
    }

    /// The current instance without creating one.
    pub fn current_instance(&self) -> Option<&Instance> {
        self.instances.current()
    }

    /// Runs a keyword with already-resolved arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`LibraryError`] if the keyword is unknown, the arguments do
    /// not fit it, its target cannot be resolved, or the keyword fails.
    #[instrument(skip(self, arguments), fields(library = %self.name))]
    pub fn run_keyword(&mut self, name: &str, arguments: &Arguments) -> Result<Value, LibraryError> {
        let handler = self.get_handler(name)?;
        handler
            .arguments()
            .check_arguments(arguments)
            .map_err(|source| LibraryError::Arguments {
                keyword: handler.longname(),
                source,
            })?;
        let instance = if handler.needs_instance() {
            Some(self.get_instance()?)
        } else {
            None
        };
        let target = handler.resolve(instance.as_ref())?;
        debug!(keyword = %handler.longname(), "Running keyword");
        target(arguments).map_err(|source| LibraryError::Invocation {
            keyword: handler.longname(),
            source,
        })
    }
}

impl fmt::Debug for TestLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestLibrary")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("scope", &self.scope())
            .field("keywords", &self.handlers.len())
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}

/// Initializer arity of a class.
pub(crate) fn init_arguments(class: &ClassDef) -> ArgumentSpec {
    class
        .init()
        .map_or(ArgumentSpec::NONE, |init| {
            ArgumentSpec::from_signature(&init.signature)
        })
}

/// Builds instances of `class`, checking the initializer arity first.
pub(crate) fn class_factory(name: &str, class: &Arc<ClassDef>, args: &[String]) -> Factory {
    let name = name.to_string();
    let class = Arc::clone(class);
    let args = args.to_vec();
    Arc::new(move || {
        init_arguments(&class)
            .check(args.len())
            .map_err(|source| LoadError::Arity {
                name: name.clone(),
                source,
            })?;
        class
            .instantiate(&args)
            .map_err(|source| LoadError::Construction {
                name: name.clone(),
                source,
            })
    })
}

pub(crate) fn read_version(attribute: Option<&Attribute>) -> String {
    match attribute {
        Some(Attribute::Value(Value::String(version))) => version.clone(),
        Some(Attribute::Value(Value::Null) | Attribute::Callable(_)) | None => String::new(),
        Some(Attribute::Value(other)) => other.to_string(),
    }
}

pub(crate) fn read_doc_format(attribute: Option<&Attribute>) -> String {
    match attribute {
        Some(Attribute::Value(Value::String(format))) => format.to_uppercase(),
        _ => String::new(),
    }
}

pub(crate) fn read_excludes(attribute: Option<&Attribute>) -> HashSet<String> {
    let Some(Attribute::Value(Value::Array(names))) = attribute else {
        return HashSet::new();
    };
    names
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Whether `name` is one of the declared metadata attributes.
pub(crate) fn is_metadata(name: &str) -> bool {
    [
        LIBRARY_SCOPE,
        LIBRARY_VERSION,
        LIBRARY_DOC_FORMAT,
        LIBRARY_EXCLUDES,
    ]
    .contains(&name)
}

/// Member names starting with an underscore are never keywords.
pub(crate) fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

/// Text of a documentation answer: null is empty, non-strings are rendered.
pub(crate) fn render_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Adds a handler; a later handler with the same key replaces the earlier one.
pub(crate) fn insert_handler(
    handlers: &mut HashMap<String, Arc<KeywordHandler>>,
    handler: KeywordHandler,
) {
    debug!(
        keyword = %handler.longname(),
        arguments = %handler.arguments(),
        "Discovered keyword"
    );
    if let Some(previous) = handlers.insert(handler.key().to_string(), Arc::new(handler)) {
        debug!(keyword = %previous.longname(), "Replaced keyword with the same normalized name");
    }
}
