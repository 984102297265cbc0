//! Code lists for ID-typed data elements

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Allowed values for a coded data element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeList {
    /// Name the list is registered and referenced under
    pub name: String,
    codes: BTreeSet<String>,
    /// Whether lookups compare case
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl CodeList {
    /// Create a new empty code list
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codes: BTreeSet::new(),
            case_sensitive: true,
        }
    }

    /// Create with a set of codes
    pub fn with_codes<I, S>(name: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            codes: codes.into_iter().map(Into::into).collect(),
            case_sensitive: true,
        }
    }

    #[must_use]
    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = sensitive;
        self
    }

    pub fn add(&mut self, code: impl Into<String>) {
        self.codes.insert(code.into());
    }

    /// Check whether `code` is one of the listed values
    #[must_use]
    pub fn is_valid(&self, code: &str) -> bool {
        if self.case_sensitive {
            self.codes.contains(code)
        } else {
            self.codes.iter().any(|c| c.eq_ignore_ascii_case(code))
        }
    }

    /// Human readable reason for a rejected code
    #[must_use]
    pub fn describe_rejection(&self, code: &str) -> String {
        let sample: Vec<&str> = self.codes.iter().take(5).map(String::as_str).collect();
        let more = if self.codes.len() > sample.len() { ", ..." } else { "" };
        format!(
            "'{code}' is not a valid code in list '{}' (expected one of {}{more})",
            self.name,
            sample.join(", ")
        )
    }

    /// Codes in sorted order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }
}

/// Named code lists shared between element templates
#[derive(Debug, Clone, Default)]
pub struct CodeListRegistry {
    lists: HashMap<String, Arc<CodeList>>,
}

impl CodeListRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a code list, replacing any list with the same name
    pub fn register(&mut self, list: CodeList) -> Arc<CodeList> {
        let list = Arc::new(list);
        self.lists.insert(list.name.clone(), Arc::clone(&list));
        list
    }

    /// Get a shared handle to a code list by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CodeList>> {
        self.lists.get(name).cloned()
    }

    /// Names of all registered lists, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.lists.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
