//! Libraries implementing the dynamic keyword protocol.
//!
//! A dynamic library enumerates its keywords at load time instead of
//! exposing them as members. Each contract method may be spelled in snake
//! case or camel case; snake case is tried first.
//!
//! | method | purpose |
//! |---|---|
//! | `get_keyword_names` | keyword names, required |
//! | `get_keyword_documentation` | per keyword docs, plus `__intro__` and `__init__` |
//! | `get_keyword_arguments` | per keyword argument tokens |
//! | `run_keyword` | unified invoker |

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn};

use super::{
    Documentation, InitHandler, LIBRARY_DOC_FORMAT, LIBRARY_SCOPE, LIBRARY_VERSION, LibraryKind,
    TestLibrary, class_factory, init_arguments, insert_handler, read_doc_format, read_version,
    render_text,
};
use crate::{
    arguments::{ArgumentSpec, ParamKind},
    handler::{KeywordHandler, Resolution, bind_invoker},
    loader::LoadError,
    object::{Arguments, CallError, Callable, Instance, value_kind},
    scope::{Scope, ScopeManager},
    source::{ClassDef, MethodDef},
};

pub(crate) const GET_KEYWORD_NAMES: [&str; 2] = ["get_keyword_names", "getKeywordNames"];
pub(crate) const GET_KEYWORD_DOCUMENTATION: [&str; 2] =
    ["get_keyword_documentation", "getKeywordDocumentation"];
pub(crate) const GET_KEYWORD_ARGUMENTS: [&str; 2] =
    ["get_keyword_arguments", "getKeywordArguments"];
pub(crate) const RUN_KEYWORD: [&str; 2] = ["run_keyword", "runKeyword"];

const INTRO_MARKER: &str = "__intro__";
const INIT_MARKER: &str = "__init__";

/// Whether `class` declares a keyword name enumerator.
pub(crate) fn is_dynamic(class: &ClassDef) -> bool {
    GET_KEYWORD_NAMES
        .iter()
        .any(|name| class.method(name).is_some())
}

/// The first callable spelling of a contract method on `instance`.
///
/// A member that exists but is not callable is passed over for the next
/// spelling.
pub(crate) fn contract(instance: &Instance, names: &[&str; 2]) -> Option<Callable> {
    names.iter().find_map(|name| instance.callable(name))
}

/// Whether the declared invoker takes a third, named-arguments parameter.
fn invoker_accepts_named(class: &ClassDef) -> bool {
    let Some(signature) = RUN_KEYWORD
        .iter()
        .find_map(|name| class.method(name))
        .and_then(MethodDef::signature)
    else {
        return false;
    };
    let params = signature.params();
    params.iter().any(|param| param.kind == ParamKind::NamedBag)
        || params
            .iter()
            .filter(|param| param.kind != ParamKind::Receiver)
            .count()
            >= 3
}

fn keyword_names(library: &str, instance: &Instance) -> Result<Vec<String>, LoadError> {
    let failed = |reason: String| LoadError::KeywordNames {
        name: library.to_string(),
        reason,
    };
    let enumerator = contract(instance, &GET_KEYWORD_NAMES)
        .ok_or_else(|| failed("no callable keyword name enumerator".to_string()))?;
    match enumerator(&Arguments::new()).map_err(|err| failed(err.to_string()))? {
        Value::Array(names) => names
            .into_iter()
            .map(|name| match name {
                Value::String(name) => Ok(name),
                other => Err(failed(format!(
                    "keyword names must be strings, got <{}>",
                    value_kind(&other)
                ))),
            })
            .collect(),
        other => Err(failed(format!(
            "expected a list of keyword names, got <{}>",
            value_kind(&other)
        ))),
    }
}

fn keyword_doc(query: Option<&Callable>, keyword: &str) -> Result<String, CallError> {
    match query {
        Some(query) => Ok(render_text(query(&Arguments::positional([keyword]))?)),
        None => Ok(String::new()),
    }
}

fn keyword_arguments(
    query: Option<&Callable>,
    keyword: &str,
    named: bool,
) -> Result<ArgumentSpec, CallError> {
    let Some(query) = query else {
        return Ok(ArgumentSpec::unrestricted(named));
    };
    match query(&Arguments::positional([keyword]))? {
        Value::Null => Ok(ArgumentSpec::unrestricted(named)),
        Value::Array(tokens) => {
            ArgumentSpec::from_dynamic_tokens(&tokens).map_err(|err| CallError::new(err.to_string()))
        }
        other => Err(CallError::new(format!(
            "expected a list of argument names, got <{}>",
            value_kind(&other)
        ))),
    }
}

/// Contract methods fetched from the discovery instance.
struct Contract {
    documentation: Option<Callable>,
    arguments: Option<Callable>,
    invoker: Option<Callable>,
    named: bool,
}

impl Contract {
    fn discover(
        &self,
        library: &str,
        keyword: &str,
        scope: Scope,
    ) -> Result<KeywordHandler, CallError> {
        let doc = keyword_doc(self.documentation.as_ref(), keyword)?;
        let arguments = keyword_arguments(self.arguments.as_ref(), keyword, self.named)?;
        let resolution = match &self.invoker {
            Some(_) if arguments.accepts_named_bag() && !self.named => {
                return Err(CallError::new(
                    "named arguments need an invoker accepting them",
                ));
            }
            Some(invoker) if scope == Scope::Global => {
                Resolution::Bound(bind_invoker(Arc::clone(invoker), keyword, self.named))
            }
            Some(_) => Resolution::Invoker {
                named_bag: self.named,
            },
            None => Resolution::Attribute,
        };
        Ok(KeywordHandler::new(
            library,
            keyword.to_string(),
            keyword,
            arguments,
            &doc,
            resolution,
        ))
    }
}

/// Builds a dynamic library.
///
/// Discovery needs an instance, so the initializer arity is checked here for
/// every scope. A global library keeps the instance; other scopes drop it so
/// their first real instance is created on demand.
pub(crate) fn load(
    name: &str,
    class: &Arc<ClassDef>,
    args: Vec<String>,
) -> Result<TestLibrary, LoadError> {
    let scope = Scope::from_attribute(class.attribute(LIBRARY_SCOPE));
    let factory = class_factory(name, class, &args);
    let discovery = factory()?;

    let names = keyword_names(name, &discovery)?;
    let invoker = contract(&discovery, &RUN_KEYWORD);
    let protocol = Contract {
        documentation: contract(&discovery, &GET_KEYWORD_DOCUMENTATION),
        arguments: contract(&discovery, &GET_KEYWORD_ARGUMENTS),
        named: invoker.is_some() && invoker_accepts_named(class),
        invoker,
    };

    let mut handlers = HashMap::new();
    for keyword in &names {
        match protocol.discover(name, keyword, scope) {
            Ok(handler) => insert_handler(&mut handlers, handler),
            Err(err) => {
                warn!(library = name, keyword = %keyword, error = %err, "Skipped dynamic keyword");
            }
        }
    }

    let instances = if scope == Scope::Global {
        ScopeManager::with_instance(scope, discovery)
    } else {
        debug!(library = name, scope = %scope, "Discarded discovery instance");
        ScopeManager::new(scope)
    };

    let init_doc = class.init().map_or("", |init| init.doc.as_str());
    Ok(TestLibrary {
        name: name.to_string(),
        kind: LibraryKind::Dynamic,
        version: read_version(class.attribute(LIBRARY_VERSION)),
        doc: Documentation::dynamic(
            name,
            class.doc(),
            protocol.documentation.clone(),
            INTRO_MARKER,
        ),
        doc_format: read_doc_format(class.attribute(LIBRARY_DOC_FORMAT)),
        init: InitHandler {
            arguments: init_arguments(class),
            doc: Documentation::dynamic(name, init_doc, protocol.documentation, INIT_MARKER),
        },
        positional_args: args,
        handlers,
        instances,
        factory,
    })
}
