//! Library scopes and the instance slot they govern.
//!
//! Every library owns one [`ScopeManager`]. The executor reports suite and
//! test boundaries to it; depending on the scope, entering a boundary saves
//! the current instance on a stack and clears the slot, and leaving it
//! restores exactly the saved value.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::object::{Attribute, Instance};

/// Lifetime policy of a library's backing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// One instance for the whole run.
    Global,
    /// A new instance for every suite.
    #[serde(rename = "TESTSUITE")]
    Suite,
    /// A new instance for every suite and every test.
    #[default]
    #[serde(rename = "TESTCASE")]
    Test,
}

impl Scope {
    /// Parses a declared scope, case-insensitively.
    ///
    /// Only `GLOBAL` and `TESTSUITE` select a non-default scope.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "GLOBAL" => Self::Global,
            "TESTSUITE" => Self::Suite,
            _ => Self::Test,
        }
    }

    /// Reads a declared scope attribute; anything malformed means [`Scope::Test`].
    pub fn from_attribute(attribute: Option<&Attribute>) -> Self {
        match attribute {
            Some(Attribute::Value(Value::String(value))) => Self::parse(value),
            _ => Self::Test,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Suite => "TESTSUITE",
            Self::Test => "TESTCASE",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events reported out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("{event} called without a matching start")]
    Unbalanced { event: &'static str },
}

/// Stack-based instance slot.
///
/// Invariant: `saved.len()` equals the number of enter events this scope
/// reacts to that have not been matched by an end event yet.
pub struct ScopeManager {
    scope: Scope,
    current: Option<Instance>,
    saved: Vec<Option<Instance>>,
}

impl ScopeManager {
    /// Creates a manager with an empty slot.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            current: None,
            saved: Vec::new(),
        }
    }

    /// Creates a manager whose slot already holds `instance`.
    pub fn with_instance(scope: Scope, instance: Instance) -> Self {
        Self {
            scope,
            current: Some(instance),
            saved: Vec::new(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn current(&self) -> Option<&Instance> {
        self.current.as_ref()
    }

    /// Number of saved slot values.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn start_suite(&mut self) {
        if self.scope != Scope::Global {
            self.push("start_suite");
        }
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::Unbalanced`] if no suite is open.
    pub fn end_suite(&mut self) -> Result<(), ScopeError> {
        if self.scope == Scope::Global {
            return Ok(());
        }
        self.pop("end_suite")
    }

    pub fn start_test(&mut self) {
        if self.scope == Scope::Test {
            self.push("start_test");
        }
    }

    /// # Errors
    ///
    /// Returns [`ScopeError::Unbalanced`] if no test is open.
    pub fn end_test(&mut self) -> Result<(), ScopeError> {
        if self.scope != Scope::Test {
            return Ok(());
        }
        self.pop("end_test")
    }

    /// Returns the current instance, creating it first if the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns the error of `create`; the slot stays empty in that case.
    pub fn get_or_create<E>(
        &mut self,
        create: impl FnOnce() -> Result<Instance, E>,
    ) -> Result<Instance, E> {
        if let Some(instance) = &self.current {
            return Ok(Arc::clone(instance));
        }
        let instance = create()?;
        debug!(scope = %self.scope, depth = self.saved.len(), "Created library instance");
        self.current = Some(Arc::clone(&instance));
        Ok(instance)
    }

    fn push(&mut self, event: &'static str) {
        self.saved.push(self.current.take());
        debug!(event, scope = %self.scope, depth = self.saved.len(), "Saved library instance");
    }

    fn pop(&mut self, event: &'static str) -> Result<(), ScopeError> {
        let restored = self.saved.pop().ok_or(ScopeError::Unbalanced { event })?;
        self.current = restored;
        debug!(event, scope = %self.scope, depth = self.saved.len(), "Restored library instance");
        Ok(())
    }
}

impl fmt::Debug for ScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeManager")
            .field("scope", &self.scope)
            .field("has_instance", &self.current.is_some())
            .field("depth", &self.saved.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use serde_json::json;

    use super::*;
    use crate::object::{Object, callable};

    fn fresh() -> Result<Instance, Infallible> {
        Ok(Arc::new(Object::new()))
    }

    fn same(a: Option<&Instance>, b: Option<&Instance>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    #[test]
    fn test_parse_scope_values() {
        assert_eq!(Scope::parse("GLOBAL"), Scope::Global);
        assert_eq!(Scope::parse("global"), Scope::Global);
        assert_eq!(Scope::parse("TESTSUITE"), Scope::Suite);
        assert_eq!(Scope::parse("TESTCASE"), Scope::Test);
        assert_eq!(Scope::parse("invalid"), Scope::Test);
        assert_eq!(Scope::parse(""), Scope::Test);
    }

    #[test]
    fn test_from_attribute_treats_non_strings_as_default() {
        let method = Attribute::Callable(callable(|_| Ok(json!("GLOBAL"))));

        assert_eq!(Scope::from_attribute(None), Scope::Test);
        assert_eq!(Scope::from_attribute(Some(&method)), Scope::Test);
        assert_eq!(
            Scope::from_attribute(Some(&Attribute::Value(Value::Null))),
            Scope::Test
        );
        assert_eq!(
            Scope::from_attribute(Some(&Attribute::Value(json!("GLOBAL")))),
            Scope::Global
        );
    }

    #[test]
    fn test_scope_serde_uses_declared_names() {
        assert_eq!(
            serde_json::to_value(Scope::Suite).unwrap(),
            json!("TESTSUITE")
        );
        assert_eq!(
            serde_json::from_value::<Scope>(json!("GLOBAL")).unwrap(),
            Scope::Global
        );
    }

    #[test]
    fn test_get_or_create_is_stable_without_boundaries() {
        for scope in [Scope::Global, Scope::Suite, Scope::Test] {
            let mut manager = ScopeManager::new(scope);

            let first = manager.get_or_create(fresh).unwrap();
            let second = manager.get_or_create(fresh).unwrap();

            assert!(Arc::ptr_eq(&first, &second), "{scope}");
        }
    }

    #[test]
    fn test_global_ignores_all_boundaries() {
        let instance: Instance = Arc::new(Object::new());
        let mut manager = ScopeManager::with_instance(Scope::Global, Arc::clone(&instance));

        manager.start_suite();
        manager.start_test();
        manager.end_test().unwrap();
        manager.end_suite().unwrap();
        manager.end_suite().unwrap();

        assert!(same(manager.current(), Some(&instance)));
        assert_eq!(manager.depth(), 0);
    }

    #[test]
    fn test_suite_scope_clears_on_suite_and_ignores_tests() {
        let mut manager = ScopeManager::new(Scope::Suite);
        let outer = manager.get_or_create(fresh).unwrap();

        manager.start_suite();
        assert!(manager.current().is_none());
        let inner = manager.get_or_create(fresh).unwrap();
        assert!(!Arc::ptr_eq(&outer, &inner));

        manager.start_test();
        assert!(same(manager.current(), Some(&inner)));
        manager.end_test().unwrap();
        assert!(same(manager.current(), Some(&inner)));

        manager.end_suite().unwrap();
        assert!(same(manager.current(), Some(&outer)));
    }

    #[test]
    fn test_test_scope_nesting_restores_exact_values() {
        let mut manager = ScopeManager::new(Scope::Test);
        let top = manager.get_or_create(fresh).unwrap();
        let mut seen = vec![Arc::clone(&top)];

        let mut run_tests = |manager: &mut ScopeManager, count: usize| {
            let before = manager.current().cloned();
            for _ in 0..count {
                manager.start_test();
                assert!(manager.current().is_none());
                let instance = manager.get_or_create(fresh).unwrap();
                assert!(seen.iter().all(|old| !Arc::ptr_eq(old, &instance)));
                seen.push(instance);
                manager.end_test().unwrap();
                assert!(same(manager.current(), before.as_ref()));
            }
        };

        run_tests(&mut manager, 4);
        manager.start_suite();
        run_tests(&mut manager, 3);
        manager.start_suite();
        let nested = manager.get_or_create(fresh).unwrap();
        run_tests(&mut manager, 3);
        assert!(same(manager.current(), Some(&nested)));
        manager.end_suite().unwrap();
        assert!(manager.current().is_none());
        manager.end_suite().unwrap();

        assert!(same(manager.current(), Some(&top)));
        assert_eq!(manager.depth(), 0);
    }

    #[test]
    fn test_unbalanced_end_is_reported_and_slot_kept() {
        let mut manager = ScopeManager::new(Scope::Test);
        let instance = manager.get_or_create(fresh).unwrap();

        assert_eq!(
            manager.end_test(),
            Err(ScopeError::Unbalanced { event: "end_test" })
        );
        assert_eq!(
            manager.end_suite().unwrap_err().to_string(),
            "end_suite called without a matching start"
        );
        assert!(same(manager.current(), Some(&instance)));
    }

    #[test]
    fn test_failed_creation_leaves_slot_empty() {
        let mut manager = ScopeManager::new(Scope::Suite);

        let result: Result<Instance, &str> = manager.get_or_create(|| Err("boom"));

        assert_eq!(result.err(), Some("boom"));
        assert!(manager.current().is_none());
    }
}
