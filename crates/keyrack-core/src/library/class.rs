//! Libraries backed by an ordinary class.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use super::{
    Documentation, InitHandler, LIBRARY_DOC_FORMAT, LIBRARY_EXCLUDES, LIBRARY_SCOPE,
    LIBRARY_VERSION, LibraryKind, TestLibrary, class_factory, init_arguments, insert_handler,
    is_metadata, is_public, read_doc_format, read_excludes, read_version,
};
use crate::{
    arguments::ArgumentSpec,
    handler::{KeywordHandler, Resolution, printable_name},
    loader::LoadError,
    scope::{Scope, ScopeManager},
    source::ClassDef,
};

/// Builds a class library.
///
/// A global library is instantiated here, so an initializer arity mismatch
/// fails the load. Other scopes defer instantiation to the first
/// `get_instance`.
pub(crate) fn load(
    name: &str,
    class: &Arc<ClassDef>,
    args: Vec<String>,
) -> Result<TestLibrary, LoadError> {
    let scope = Scope::from_attribute(class.attribute(LIBRARY_SCOPE));
    let factory = class_factory(name, class, &args);
    let instances = if scope == Scope::Global {
        ScopeManager::with_instance(scope, factory()?)
    } else {
        ScopeManager::new(scope)
    };

    let excludes = read_excludes(class.attribute(LIBRARY_EXCLUDES));
    let mut handlers = HashMap::new();
    let attributes = class
        .callable_attributes()
        .filter(|(member, _)| !is_metadata(member))
        .map(|(member, _)| (member, ArgumentSpec::unrestricted(false), ""));
    let methods = class.methods().iter().map(|method| {
        (
            method.name(),
            ArgumentSpec::from_declared(method.signature()),
            method.doc(),
        )
    });
    for (member, arguments, doc) in attributes.chain(methods) {
        if !is_public(member) || excludes.contains(member) {
            debug!(library = name, member, "Skipped non-keyword member");
            continue;
        }
        let resolution = match instances.current() {
            Some(instance) => {
                let Some(target) = instance.callable(member) else {
                    warn!(
                        library = name,
                        member, "Skipped keyword: instance has no callable with this name"
                    );
                    continue;
                };
                Resolution::Bound(target)
            }
            None => Resolution::Attribute,
        };
        insert_handler(
            &mut handlers,
            KeywordHandler::new(
                name,
                printable_name(member),
                member,
                arguments,
                doc,
                resolution,
            ),
        );
    }

    let init_doc = class.init().map_or("", |init| init.doc.as_str());
    Ok(TestLibrary {
        name: name.to_string(),
        kind: LibraryKind::Class,
        version: read_version(class.attribute(LIBRARY_VERSION)),
        doc: Documentation::fixed(name, class.doc()),
        doc_format: read_doc_format(class.attribute(LIBRARY_DOC_FORMAT)),
        init: InitHandler {
            arguments: init_arguments(class),
            doc: Documentation::fixed(name, init_doc),
        },
        positional_args: args,
        handlers,
        instances,
        factory,
    })
}
