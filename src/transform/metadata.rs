use crate::runtime::BUILTIN_HELPERS;
use std::collections::BTreeSet;

/// Metadata collected during the analysis pass
/// This is populated by analysis plugins and used by the generator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformMetadata {
    pub helpers_declared: BTreeSet<String>,
    /// Names of unqualified calls, builtins included
    pub helpers_called: BTreeSet<String>,
    pub sections_declared: BTreeSet<String>,
    /// Names declared more than once; the generator rejects these
    pub duplicate_helpers: Vec<String>,
    pub duplicate_sections: Vec<String>,
}

impl TransformMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uses_raw(&self) -> bool {
        self.helpers_called.contains("raw")
    }

    pub fn uses_helper(&self, name: &str) -> bool {
        self.helpers_called.contains(name)
    }

    /// Called names that neither the template nor the builtins define.
    /// They must be registered on the view before it executes.
    pub fn external_helpers(&self) -> Vec<&str> {
        self.helpers_called
            .iter()
            .map(String::as_str)
            .filter(|name| !BUILTIN_HELPERS.contains(name) && !self.helpers_declared.contains(*name))
            .collect()
    }
}
