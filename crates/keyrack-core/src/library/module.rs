//! Libraries backed by a module.
//!
//! A module is its own and only instance, so module libraries always behave
//! as global ones regardless of a declared scope.

use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use super::{
    Documentation, InitHandler, LIBRARY_DOC_FORMAT, LIBRARY_EXCLUDES, LIBRARY_SCOPE,
    LIBRARY_VERSION, LibraryKind, TestLibrary, insert_handler, is_public, read_doc_format,
    read_excludes, read_version,
};
use crate::{
    arguments::ArgumentSpec,
    handler::{KeywordHandler, Resolution, printable_name},
    loader::LoadError,
    object::{Instance, LibraryObject},
    scope::{Scope, ScopeManager},
    source::{Item, ModuleDef},
};

pub(crate) fn load(
    name: &str,
    module: &Arc<ModuleDef>,
    args: Vec<String>,
) -> Result<TestLibrary, LoadError> {
    if !args.is_empty() {
        return Err(LoadError::ModuleArguments {
            name: name.to_string(),
            count: args.len(),
        });
    }

    let declared = Scope::from_attribute(module.attribute(LIBRARY_SCOPE).as_ref());
    if declared != Scope::Global {
        debug!(library = name, scope = %declared, "Ignored declared scope of module library");
    }

    let excludes = read_excludes(module.attribute(LIBRARY_EXCLUDES).as_ref());
    let mut handlers = HashMap::new();
    for (member, item) in module.items() {
        let Item::Function(function) = item else {
            continue;
        };
        if !is_public(member) || excludes.contains(member) {
            continue;
        }
        if function.module() != Some(module.path()) {
            debug!(
                library = name,
                member,
                origin = function.module().unwrap_or_default(),
                "Skipped function imported from another module"
            );
            continue;
        }
        insert_handler(
            &mut handlers,
            KeywordHandler::new(
                name,
                printable_name(member),
                member,
                ArgumentSpec::from_declared(function.signature()),
                function.doc(),
                Resolution::Bound(Arc::clone(function.body())),
            ),
        );
    }

    let instance: Instance = Arc::clone(module) as Instance;
    let factory_instance = Arc::clone(&instance);
    Ok(TestLibrary {
        name: name.to_string(),
        kind: LibraryKind::Module,
        version: read_version(module.attribute(LIBRARY_VERSION).as_ref()),
        doc: Documentation::fixed(name, module.doc()),
        doc_format: read_doc_format(module.attribute(LIBRARY_DOC_FORMAT).as_ref()),
        init: InitHandler {
            arguments: ArgumentSpec::NONE,
            doc: Documentation::fixed(name, ""),
        },
        positional_args: args,
        handlers,
        instances: ScopeManager::with_instance(Scope::Global, instance),
        factory: Arc::new(move || Ok(Arc::clone(&factory_instance))),
    })
}
