//! Library sources shared by the unit tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use serde_json::{Value, json};

use crate::{
    arguments::Signature,
    library::{LIBRARY_DOC_FORMAT, LIBRARY_EXCLUDES, LIBRARY_SCOPE, LIBRARY_VERSION},
    namespace::Namespace,
    object::{Arguments, Attribute, CallError, Instance, LibraryObject, Object, callable},
    source::{ClassDef, FunctionDef, MethodDef, ModuleDef},
};

/// Installs a test-writer subscriber once per test binary.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn first_str(args: &Arguments) -> &str {
    args.get(0).and_then(Value::as_str).unwrap_or_default()
}

fn noop(name: &str) -> MethodDef {
    MethodDef::new(name).with_body(|_| Ok(Value::Null))
}

/// Every library the tests import by name.
pub(crate) fn namespace() -> Namespace {
    Namespace::new()
        .with_module(ModuleDef::new("BuiltIn").with_class(builtin()))
        .with_class(parameter_library())
        .with_module(module_library())
        .with_module(python_module())
        .with_module(classes())
        .with_module(library_scope())
        .with_module(dynlibs())
        .with_class(run_keyword_library())
        .with_class(global_run_keyword_library())
}

fn builtin() -> ClassDef {
    ClassDef::new("BuiltIn")
        .with_doc("Generic keywords.")
        .with_value(LIBRARY_SCOPE, "GLOBAL")
        .with_method(
            MethodDef::new("log")
                .with_signature(Signature::method().required("message").optional("level"))
                .with_doc("Logs the given message.")
                .with_body(|_| Ok(Value::Null)),
        )
}

fn parameter_library() -> ClassDef {
    ClassDef::new("ParameterLibrary")
        .with_init(
            Signature::method().optional("host").optional("port"),
            "Connects to `host` on `port`.",
        )
        .with_method(MethodDef::new("parameters"))
        .with_constructor(|args| {
            let args = args.to_vec();
            let object = Object::new().with_method("parameters", move |_| Ok(json!(args)));
            Ok(Arc::new(object) as Instance)
        })
}

fn module_library() -> ModuleDef {
    let join = FunctionDef::new("join", |_| Ok(Value::Null)).defined_in("os.path");
    ModuleDef::new("module_library")
        .with_doc("Module test library.")
        .with_value(LIBRARY_VERSION, "test")
        .with_value(LIBRARY_SCOPE, "TESTCASE")
        .with_value(LIBRARY_EXCLUDES, json!(["excluded"]))
        .with_function(FunctionDef::new("passing", |_| Ok(Value::Null)))
        .with_function(
            FunctionDef::new("two_arguments", |args| {
                let parts: Vec<&str> = args.positional.iter().filter_map(Value::as_str).collect();
                Ok(json!(parts.join("-")))
            })
            .with_signature(Signature::new().required("first").required("second")),
        )
        .with_function(
            FunctionDef::new("returning", |_| Ok(json!("returned")))
                .with_doc("Returns a value."),
        )
        .with_function(FunctionDef::new("_private", |_| Ok(Value::Null)))
        .with_function(FunctionDef::new("excluded", |_| Ok(Value::Null)))
        .with_import("join", join)
}

fn python_module() -> ModuleDef {
    ModuleDef::new("pythonmodule")
        .with_value("some_string", "Hello, World!")
        .with_value("some_object", json!({"attr": 1}))
        .with_submodule(
            ModuleDef::new("pythonmodule.library").with_function(FunctionDef::new(
                "keyword_from_submodule",
                |_| Ok(json!("hello")),
            )),
        )
}

fn classes() -> ModuleDef {
    ModuleDef::new("classes")
        .with_class(name_library())
        .with_class(synonym_library())
        .with_class(
            ClassDef::new("VersionLibrary")
                .with_value(LIBRARY_VERSION, "0.1")
                .with_value(LIBRARY_DOC_FORMAT, "html")
                .with_method(noop("kw")),
        )
        .with_class(
            ClassDef::new("VersionObjectLibrary")
                .with_value(LIBRARY_VERSION, json!({"major": 1}))
                .with_method(noop("kw")),
        )
        .with_class(
            ClassDef::new("ShadowedGlobalLibrary")
                .with_value(LIBRARY_SCOPE, "GLOBAL")
                .with_method(MethodDef::new("shadowed"))
                .with_method(noop("visible")),
        )
        .with_class(arg_doc_library("ArgDocDynamicLibrary", false))
        .with_class(arg_doc_library("ArgDocDynamicLibraryWithKwargsSupport", true))
        .with_class(
            dynamic_class("InvalidAttributeDynamicLibrary", &["Keyword"])
                .with_value("get_keyword_documentation", true)
                .with_value("get_keyword_arguments", 1),
        )
        .with_class(
            dynamic_class("InvalidGetDocDynamicLibrary", &["Broken", "Working"]).with_method(
                MethodDef::new("get_keyword_documentation").with_body(|args| {
                    match first_str(args) {
                        "Working" => Ok(json!("Works.")),
                        other => Err(CallError::new(format!("no doc for '{other}'"))),
                    }
                }),
            ),
        )
        .with_class(
            dynamic_class(
                "InvalidGetArgsDynamicLibrary",
                &["Raising", "Not A List", "Bad Token", "Working"],
            )
            .with_method(MethodDef::new("get_keyword_arguments").with_body(|args| {
                match first_str(args) {
                    "Raising" => Err(CallError::new("cannot get arguments")),
                    "Not A List" => Ok(json!("arg")),
                    "Bad Token" => Ok(json!([1])),
                    _ => Ok(json!([])),
                }
            })),
        )
}

fn name_library() -> ClassDef {
    ClassDef::new("NameLibrary")
        .with_value(LIBRARY_EXCLUDES, json!(["excluded_keyword"]))
        .with_method(noop("simple_1"))
        .with_method(noop("getName"))
        .with_method(
            MethodDef::new("set_name")
                .with_signature(Signature::method().required("name"))
                .with_body(|_| Ok(Value::Null)),
        )
        .with_method(noop("no_operation"))
        .with_method(noop("kw_2"))
        .with_method(noop("_private"))
        .with_method(noop("excluded_keyword"))
}

fn synonym_library() -> ClassDef {
    let body = callable(|_| Ok(json!("handled")));
    ["handler", "synonym_handler", "another_synonym"]
        .into_iter()
        .fold(ClassDef::new("SynonymLibrary"), |class, name| {
            class.with_method(MethodDef::new(name).with_callable(Arc::clone(&body)))
        })
}

/// A dynamic class whose enumerator returns `names`.
fn dynamic_class(name: &str, names: &[&str]) -> ClassDef {
    let names = json!(names);
    ClassDef::new(name)
        .with_method(MethodDef::new("get_keyword_names").with_body(move |_| Ok(names.clone())))
}

fn arg_doc_library(name: &str, named: bool) -> ClassDef {
    let specs = json!({
        "No Arg": [],
        "One Arg": ["arg"],
        "One or Two Args": ["arg", "default=x"],
        "Many Args": ["*args"],
        "No Arg Spec": null,
        "Kwargs": ["**kwargs"],
        "Varargs and Kwargs": ["*args", "**kwargs"],
    });
    let docs = json!({
        "No Arg": "(0,0)",
        "One Arg": "(1,1)",
        "One or Two Args": "(1,2)",
        "Many Args": "(0,*)",
        "Kwargs": "(0,0,**)",
        "Varargs and Kwargs": "(0,*,**)",
    });
    let names: Vec<&str> = specs
        .as_object()
        .map(|specs| specs.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let invoker = if named {
        Signature::method()
            .required("name")
            .required("args")
            .named_bag("kwargs")
    } else {
        Signature::method().required("name").required("args")
    };

    let class = dynamic_class(name, &names);
    class
        .with_method(
            MethodDef::new("get_keyword_arguments").with_body(move |args| {
                Ok(specs.get(first_str(args)).cloned().unwrap_or(Value::Null))
            }),
        )
        .with_method(
            MethodDef::new("get_keyword_documentation").with_body(move |args| {
                Ok(docs.get(first_str(args)).cloned().unwrap_or(Value::Null))
            }),
        )
        .with_method(
            MethodDef::new("run_keyword")
                .with_signature(invoker)
                .with_body(|args| Ok(Value::Array(args.positional.clone()))),
        )
}

fn library_scope() -> ModuleDef {
    let scoped = |name: &str, scope: Attribute| {
        ClassDef::new(name)
            .with_attribute(LIBRARY_SCOPE, scope)
            .with_method(noop("kw"))
    };
    ModuleDef::new("libraryscope")
        .with_class(scoped("Global", json!("global").into()))
        .with_class(scoped("Suite", json!("TESTSUITE").into()))
        .with_class(scoped("Test", json!("TESTCASE").into()))
        .with_class(scoped("InvalidValue", json!("invalid").into()))
        .with_class(scoped("InvalidEmpty", json!("").into()))
        .with_class(scoped(
            "InvalidMethod",
            Attribute::Callable(callable(|_| Ok(json!("GLOBAL")))),
        ))
        .with_class(scoped("InvalidNone", Value::Null.into()))
}

fn doc_query(intro: Option<&'static str>, init: Option<&'static str>) -> MethodDef {
    MethodDef::new("get_keyword_documentation").with_body(move |args| {
        Ok(match first_str(args) {
            "__intro__" => json!(intro),
            "__init__" => json!(init),
            _ => Value::Null,
        })
    })
}

fn dynlibs() -> ModuleDef {
    let static_docs = |name: &str| {
        dynamic_class(name, &[])
            .with_doc("This is lib intro.")
            .with_init(Signature::method().optional("arg"), "Init doc.")
    };
    ModuleDef::new("dynlibs")
        .with_class(static_docs("StaticDocsLib").with_method(doc_query(None, Some(""))))
        .with_class(
            dynamic_class("DynamicDocsLib", &[])
                .with_method(doc_query(Some("Dynamic intro doc."), Some("Dynamic init doc."))),
        )
        .with_class(
            static_docs("StaticAndDynamicDocsLib")
                .with_method(doc_query(Some("Dynamic intro doc."), Some("Dynamic init doc."))),
        )
        .with_class(
            dynamic_class("FailingDynamicDocLib", &["Keyword"]).with_method(
                MethodDef::new("get_keyword_documentation").with_body(|args| {
                    match first_str(args) {
                        marker @ ("__intro__" | "__init__") => Err(CallError::new(format!(
                            "Failing in 'get_keyword_documentation' with '{marker}'."
                        ))),
                        _ => Ok(Value::Null),
                    }
                }),
            ),
        )
}

/// A test-scoped dynamic library whose instances are numbered in creation
/// order and whose invoker echoes the instance number.
fn run_keyword_library() -> ClassDef {
    let created = Arc::new(AtomicUsize::new(0));
    ClassDef::new("RunKeywordLibrary")
        .with_method(MethodDef::new("get_keyword_names"))
        .with_method(
            MethodDef::new("run_keyword")
                .with_signature(Signature::method().required("name").required("args")),
        )
        .with_constructor(move |_| {
            let number = created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Arc::new(
                Object::new()
                    .with_method("get_keyword_names", |_| Ok(json!(["Echo"])))
                    .with_method("run_keyword", move |args| {
                        Ok(json!({"instance": number, "call": args.positional}))
                    }),
            ) as Instance)
        })
}

fn global_run_keyword_library() -> ClassDef {
    dynamic_class("GlobalRunKeywordLibrary", &["Echo"])
        .with_value(LIBRARY_SCOPE, "GLOBAL")
        .with_method(
            MethodDef::new("run_keyword")
                .with_signature(
                    Signature::method()
                        .required("name")
                        .required("args")
                        .named_bag("kwargs"),
                )
                .with_body(|args| Ok(Value::Array(args.positional.clone()))),
        )
}

/// Attribute and call counts of a recording library.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub accessed: AtomicUsize,
    pub called: AtomicUsize,
    pub created: AtomicUsize,
}

/// An instance exposing a single keyword `kw` that counts both lookups of
/// the member and calls of it.
struct RecordingObject {
    counters: Arc<Counters>,
}

impl LibraryObject for RecordingObject {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        if name != "kw" {
            return None;
        }
        self.counters.accessed.fetch_add(1, Ordering::SeqCst);
        let counters = Arc::clone(&self.counters);
        Some(Attribute::Callable(callable(move |_| {
            counters.called.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })))
    }
}

pub(crate) fn recording_library(name: &str, scope: Option<&str>) -> (ClassDef, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let shared = Arc::clone(&counters);
    let mut class = ClassDef::new(name)
        .with_method(MethodDef::new("kw"))
        .with_constructor(move |_| {
            shared.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordingObject {
                counters: Arc::clone(&shared),
            }) as Instance)
        });
    if let Some(scope) = scope {
        class = class.with_value(LIBRARY_SCOPE, scope);
    }
    (class, counters)
}

