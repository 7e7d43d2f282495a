//! Argument specifications for keywords and library initializers.

use std::fmt;

use serde_json::Value;

use crate::object::{Arguments, value_kind};

/// Errors produced while building or checking an [`ArgumentSpec`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ArgumentError {
    /// Positional argument count outside the accepted range.
    #[error("expected {expected}, got {got}")]
    Count { expected: String, got: usize },

    /// Named arguments given to something without a named bag.
    #[error("does not accept named arguments, got {}", .names.join(", "))]
    UnexpectedNamed { names: Vec<String> },

    /// A dynamic argument token was not a string.
    #[error("argument specification must contain only strings, got <{0}>")]
    InvalidToken(&'static str),
}

/// Kind of a declared formal parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Implicit receiver of an instance method. Never counted.
    Receiver,
    /// Positional parameter without a default.
    Required,
    /// Positional parameter with a default.
    Optional,
    /// Variadic positional parameter.
    Variadic,
    /// Open-ended named-parameter bag.
    NamedBag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// Formal parameter list of a method, function or initializer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an instance-method signature with its receiver.
    #[must_use]
    pub fn method() -> Self {
        Self::new().param("self", ParamKind::Receiver)
    }

    #[must_use]
    pub fn required(self, name: &str) -> Self {
        self.param(name, ParamKind::Required)
    }

    #[must_use]
    pub fn optional(self, name: &str) -> Self {
        self.param(name, ParamKind::Optional)
    }

    #[must_use]
    pub fn variadic(self, name: &str) -> Self {
        self.param(name, ParamKind::Variadic)
    }

    #[must_use]
    pub fn named_bag(self, name: &str) -> Self {
        self.param(name, ParamKind::NamedBag)
    }

    #[must_use]
    pub fn param(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// Normalized arity of a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgumentSpec {
    min_args: usize,
    max_args: Option<usize>,
    named_bag: bool,
}

impl ArgumentSpec {
    /// Accepts no arguments at all.
    pub const NONE: Self = Self {
        min_args: 0,
        max_args: Some(0),
        named_bag: false,
    };

    /// Creates a spec; a bounded maximum below `min_args` is raised to it.
    #[must_use]
    pub fn new(min_args: usize, max_args: Option<usize>, named_bag: bool) -> Self {
        Self {
            min_args,
            max_args: max_args.map(|max| max.max(min_args)),
            named_bag,
        }
    }

    /// Accepts any number of positional arguments.
    #[must_use]
    pub const fn unrestricted(named_bag: bool) -> Self {
        Self {
            min_args: 0,
            max_args: None,
            named_bag,
        }
    }

    /// Derives the spec from a declared parameter list.
    #[must_use]
    pub fn from_signature(signature: &Signature) -> Self {
        let mut min_args = 0;
        let mut max_args = Some(0);
        let mut named_bag = false;
        for param in signature.params() {
            match param.kind {
                ParamKind::Receiver => {}
                ParamKind::Required => {
                    min_args += 1;
                    max_args = max_args.map(|max| max + 1);
                }
                ParamKind::Optional => max_args = max_args.map(|max| max + 1),
                ParamKind::Variadic => max_args = None,
                ParamKind::NamedBag => named_bag = true,
            }
        }
        Self::new(min_args, max_args, named_bag)
    }

    /// Derives the spec from parameters that may be unknown. Unknown
    /// parameters accept any positional arguments.
    #[must_use]
    pub fn from_declared(signature: Option<&Signature>) -> Self {
        signature.map_or(Self::unrestricted(false), Self::from_signature)
    }

    /// Derives the spec from dynamic argument tokens such as `"arg"`,
    /// `"arg=default"`, `"*rest"` and `"**named"`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::InvalidToken`] if a token is not a string.
    pub fn from_dynamic_tokens(tokens: &[Value]) -> Result<Self, ArgumentError> {
        let mut signature = Signature::new();
        for token in tokens {
            let Value::String(token) = token else {
                return Err(ArgumentError::InvalidToken(value_kind(token)));
            };
            signature = if let Some(name) = token.strip_prefix("**") {
                signature.named_bag(name)
            } else if let Some(name) = token.strip_prefix('*') {
                signature.variadic(name)
            } else if let Some((name, _default)) = token.split_once('=') {
                signature.optional(name)
            } else {
                signature.required(token)
            };
        }
        Ok(Self::from_signature(&signature))
    }

    pub const fn min_args(&self) -> usize {
        self.min_args
    }

    /// Upper bound, `None` when unbounded.
    pub const fn max_args(&self) -> Option<usize> {
        self.max_args
    }

    pub const fn accepts_named_bag(&self) -> bool {
        self.named_bag
    }

    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }

    /// Checks a positional argument count against this spec.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Count`] when `count` is out of range.
    pub fn check(&self, count: usize) -> Result<(), ArgumentError> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(ArgumentError::Count {
                expected: self.expected(),
                got: count,
            })
        }
    }

    /// Checks both positional count and named arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::Count`] when the positional count is out of
    /// range, or [`ArgumentError::UnexpectedNamed`] when named arguments are
    /// given but no named bag is accepted.
    pub fn check_arguments(&self, arguments: &Arguments) -> Result<(), ArgumentError> {
        self.check(arguments.positional.len())?;
        if !self.named_bag && !arguments.named.is_empty() {
            return Err(ArgumentError::UnexpectedNamed {
                names: arguments.named.keys().cloned().collect(),
            });
        }
        Ok(())
    }

    fn expected(&self) -> String {
        let noun = |n: usize| if n == 1 { "argument" } else { "arguments" };
        match self.max_args {
            Some(max) if max == self.min_args => format!("{max} {}", noun(max)),
            Some(max) => format!("{} to {max} {}", self.min_args, noun(max)),
            None => format!("at least {} {}", self.min_args, noun(self.min_args)),
        }
    }
}

impl Default for ArgumentSpec {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ArgumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_args {
            Some(max) => write!(f, "{}..={max}", self.min_args)?,
            None => write!(f, "{}..", self.min_args)?,
        }
        if self.named_bag {
            f.write_str(" +named")?;
        }
        Ok(())
    }
}
