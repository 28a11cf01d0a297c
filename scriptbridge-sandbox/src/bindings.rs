//! The names a script is allowed to see.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A host function callable from scripts. Arguments and the return value
/// cross the boundary as JSON; an `Err` is raised as a script error.
pub type HostFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync>;

/// One bound name.
#[derive(Clone)]
pub enum Binding {
    Value(Value),
    Function(HostFn),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Pure language helpers copied into the environment by
/// [`Bindings::with_prelude`].
pub const PRELUDE: &[&str] = &[
    "type", "tostring", "tonumber", "pairs", "ipairs", "select", "error", "pcall", "assert",
    "math", "string", "table",
];

/// Explicit set of names visible to a script.
///
/// Nothing else is reachable: the environment starts empty and is filled
/// only from this set.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: BTreeMap<String, Binding>,
    prelude: bool,
    print: bool,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to a data value.
    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, Binding::Value(value));
        self
    }

    /// Binds `name` to a host function.
    pub fn function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert(name, Binding::Function(Arc::new(f)));
        self
    }

    /// Adds the [`PRELUDE`] helpers.
    pub fn with_prelude(mut self) -> Self {
        self.prelude = true;
        self
    }

    /// Binds `print` to the captured output buffer.
    pub fn with_print(mut self) -> Self {
        self.print = true;
        self
    }

    /// Adds or replaces one binding.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.entries.insert(name.into(), binding);
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prelude(&self) -> bool {
        self.prelude
    }

    pub fn print(&self) -> bool {
        self.print
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, Value)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for (name, value) in iter {
            bindings.insert(name, Binding::Value(value));
        }
        bindings
    }
}
