//! Keyword handlers and keyword name normalization.

use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{
    arguments::ArgumentSpec,
    library::{
        LibraryError,
        dynamic::{RUN_KEYWORD, contract},
    },
    object::{Arguments, Callable, Instance, callable},
};

/// Normalizes a keyword name into its lookup key.
///
/// Lower-cases and drops whitespace and underscores, so `"Log Many"`,
/// `"log_many"` and `"L O G M A N Y"` share one key.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Turns a member name into a display name: `no_operation` becomes
/// `No Operation` and `getName` becomes `Get Name`.
pub fn printable_name(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for part in name.split('_').filter(|part| !part.is_empty()) {
        let mut word = String::new();
        let mut previous_lower = false;
        for c in part.chars() {
            if c.is_uppercase() && previous_lower {
                words.push(std::mem::take(&mut word));
            }
            previous_lower = c.is_lowercase() || c.is_ascii_digit();
            word.push(c);
        }
        words.push(word);
    }
    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// How a handler obtains its target callable at invocation time.
#[derive(Clone)]
pub enum Resolution {
    /// Fetched once at discovery time and reused for every call.
    Bound(Callable),
    /// Looked up by handler name on the current instance on every call.
    Attribute,
    /// Routed through the current instance's unified invoker on every call.
    Invoker { named_bag: bool },
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound(_) => f.write_str("Bound(..)"),
            Self::Attribute => f.write_str("Attribute"),
            Self::Invoker { named_bag } => f
                .debug_struct("Invoker")
                .field("named_bag", named_bag)
                .finish(),
        }
    }
}

/// One keyword discovered from a library.
#[derive(Debug, Clone)]
pub struct KeywordHandler {
    name: String,
    handler_name: String,
    library: String,
    key: String,
    arguments: ArgumentSpec,
    doc: String,
    resolution: Resolution,
}

impl KeywordHandler {
    pub(crate) fn new(
        library: &str,
        name: String,
        handler_name: &str,
        arguments: ArgumentSpec,
        doc: &str,
        resolution: Resolution,
    ) -> Self {
        Self {
            key: normalize(&name),
            name,
            handler_name: handler_name.to_string(),
            library: library.to_string(),
            arguments,
            doc: doc.to_string(),
            resolution,
        }
    }

    /// Display name of the keyword.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw member or declared name used for lookups on the instance.
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    /// `<library>.<name>`.
    pub fn longname(&self) -> String {
        format!("{}.{}", self.library, self.name)
    }

    /// Normalized lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn arguments(&self) -> &ArgumentSpec {
        &self.arguments
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// First line of the documentation.
    pub fn short_doc(&self) -> &str {
        self.doc.lines().next().unwrap_or_default()
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// The callable cached at discovery time, if any.
    pub fn bound(&self) -> Option<&Callable> {
        match &self.resolution {
            Resolution::Bound(target) => Some(target),
            Resolution::Attribute | Resolution::Invoker { .. } => None,
        }
    }

    /// Whether resolving needs the library's current instance.
    pub fn needs_instance(&self) -> bool {
        self.bound().is_none()
    }

    /// Obtains the concrete callable for one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::MissingTarget`] when the instance does not
    /// expose the needed callable, or when an instance is needed but none
    /// was given.
    pub fn resolve(&self, instance: Option<&Instance>) -> Result<Callable, LibraryError> {
        let missing = |attribute: &str| LibraryError::MissingTarget {
            keyword: self.longname(),
            attribute: attribute.to_string(),
        };
        match &self.resolution {
            Resolution::Bound(target) => Ok(Arc::clone(target)),
            Resolution::Attribute => instance
                .and_then(|instance| instance.callable(&self.handler_name))
                .ok_or_else(|| missing(&self.handler_name)),
            Resolution::Invoker { named_bag } => {
                let invoker = instance
                    .and_then(|instance| contract(instance, &RUN_KEYWORD))
                    .ok_or_else(|| missing(RUN_KEYWORD[0]))?;
                Ok(bind_invoker(invoker, &self.handler_name, *named_bag))
            }
        }
    }
}

/// Wraps a unified invoker into a callable for one keyword.
pub(crate) fn bind_invoker(invoker: Callable, keyword: &str, named_bag: bool) -> Callable {
    let keyword = keyword.to_string();
    callable(move |args| invoker(&invoker_arguments(&keyword, args, named_bag)))
}

/// Arguments for a unified invoker: `(name, [args...])`, plus `{named...}`
/// when the invoker accepts named arguments.
fn invoker_arguments(keyword: &str, args: &Arguments, named_bag: bool) -> Arguments {
    let mut positional = vec![
        Value::String(keyword.to_string()),
        Value::Array(args.positional.clone()),
    ];
    if named_bag {
        positional.push(Value::Object(args.named.clone()));
    }
    Arguments {
        positional,
        named: serde_json::Map::new(),
    }
}
