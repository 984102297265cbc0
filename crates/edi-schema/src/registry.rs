//! Schema lookup: resolving transaction-set templates for a parsed header

use crate::model::{TemplateEnvelope, TemplateTransactionSet};
use crate::{Error, Result};
use dashmap::DashMap;
use edi_ir::{Format, TransactionSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Identity of a transaction set as read from its envelope headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TransactionSetKey {
    pub id: String,
    pub version: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub test_indicator: Option<String>,
}

impl TransactionSetKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = non_empty(version.into());
        self
    }

    #[must_use]
    pub fn with_parties(mut self, sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        self.sender = non_empty(sender.into());
        self.receiver = non_empty(receiver.into());
        self
    }

    #[must_use]
    pub fn with_test_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.test_indicator = non_empty(indicator.into());
        self
    }

    /// Keys to try, most specific first: full, without test indicator,
    /// id and version, id alone.
    #[must_use]
    pub fn candidates(&self) -> Vec<TransactionSetKey> {
        let mut out = vec![self.clone()];
        let mut push = |key: TransactionSetKey| {
            if !out.contains(&key) {
                out.push(key);
            }
        };
        push(Self {
            test_indicator: None,
            ..self.clone()
        });
        push(Self {
            id: self.id.clone(),
            version: self.version.clone(),
            ..Self::default()
        });
        push(Self::new(self.id.clone()));
        out
    }
}

impl From<&TransactionSet> for TransactionSetKey {
    fn from(ts: &TransactionSet) -> Self {
        Self {
            id: ts.id.clone(),
            version: ts.version.clone(),
            sender: ts.sender.clone(),
            receiver: ts.receiver.clone(),
            test_indicator: ts.test_indicator.clone(),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

impl fmt::Display for TransactionSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)?;
        for part in [&self.version, &self.sender, &self.receiver, &self.test_indicator] {
            write!(f, ":{}", part.as_deref().unwrap_or("*"))?;
        }
        Ok(())
    }
}

/// Source of templates consulted by the parsers
pub trait SchemaLookup {
    /// Resolve the template for a transaction set
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no template matches the key.
    fn transaction_set(&self, key: &TransactionSetKey) -> Result<Arc<TemplateTransactionSet>>;

    /// Envelope templates for a format; `None` means the parser's built-in ones
    fn envelope(&self, format: Format) -> Option<Arc<TemplateEnvelope>>;
}

impl<T: SchemaLookup + ?Sized> SchemaLookup for Arc<T> {
    fn transaction_set(&self, key: &TransactionSetKey) -> Result<Arc<TemplateTransactionSet>> {
        (**self).transaction_set(key)
    }

    fn envelope(&self, format: Format) -> Option<Arc<TemplateEnvelope>> {
        (**self).envelope(format)
    }
}

/// Concurrent template registry with a resolution cache
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    sets: DashMap<TransactionSetKey, Arc<TemplateTransactionSet>>,
    envelopes: DashMap<Format, Arc<TemplateEnvelope>>,
    resolved: DashMap<TransactionSetKey, Arc<TemplateTransactionSet>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its own id and version
    pub fn register(&self, template: TemplateTransactionSet) -> Arc<TemplateTransactionSet> {
        let mut key = TransactionSetKey::new(template.id.clone());
        key.version.clone_from(&template.version);
        self.register_for(key, template)
    }

    /// Register a template under an explicit (e.g. partner-specific) key
    pub fn register_for(
        &self,
        key: TransactionSetKey,
        template: TemplateTransactionSet,
    ) -> Arc<TemplateTransactionSet> {
        debug!("Registering transaction set template {}", key);
        let template = Arc::new(template);
        self.sets.insert(key, Arc::clone(&template));
        self.resolved.clear();
        template
    }

    pub fn register_envelope(&self, template: TemplateEnvelope) {
        self.envelopes.insert(template.format, Arc::new(template));
    }

    /// Number of registered transaction-set templates
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl SchemaLookup for SchemaRegistry {
    fn transaction_set(&self, key: &TransactionSetKey) -> Result<Arc<TemplateTransactionSet>> {
        if let Some(hit) = self.resolved.get(key) {
            trace!("Cache hit for transaction set {}", key);
            return Ok(Arc::clone(hit.value()));
        }
        for candidate in key.candidates() {
            if let Some(found) = self.sets.get(&candidate) {
                let template = Arc::clone(found.value());
                drop(found);
                debug!("Resolved {} as {}", key, candidate);
                self.resolved.insert(key.clone(), Arc::clone(&template));
                return Ok(template);
            }
        }
        Err(Error::NotFound(key.to_string()))
    }

    fn envelope(&self, format: Format) -> Option<Arc<TemplateEnvelope>> {
        self.envelopes.get(&format).map(|e| Arc::clone(e.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TransactionSetKey {
        TransactionSetKey::new("ORDERS")
            .with_version("D96A")
            .with_parties("SENDER", "RECEIVER")
            .with_test_indicator("1")
    }

    #[test]
    fn test_candidates_most_specific_first() {
        let c = key().candidates();
        assert_eq!(c.len(), 4);
        assert_eq!(c[0], key());
        assert!(c[1].test_indicator.is_none() && c[1].sender.is_some());
        assert_eq!(c[2], TransactionSetKey::new("ORDERS").with_version("D96A"));
        assert_eq!(c[3], TransactionSetKey::new("ORDERS"));
    }

    #[test]
    fn test_candidates_deduplicate_bare_key() {
        assert_eq!(TransactionSetKey::new("INVOIC").candidates().len(), 1);
    }

    #[test]
    fn test_resolution_prefers_partner_template() {
        let registry = SchemaRegistry::new();
        registry.register(TemplateTransactionSet::new("ORDERS", "Generic"));
        registry.register(TemplateTransactionSet::new("ORDERS", "Versioned").version("D96A"));
        registry.register_for(
            TransactionSetKey::new("ORDERS")
                .with_version("D96A")
                .with_parties("SENDER", "RECEIVER"),
            TemplateTransactionSet::new("ORDERS", "Partner"),
        );

        assert_eq!(registry.transaction_set(&key()).unwrap().name, "Partner");
        let other = TransactionSetKey::new("ORDERS").with_version("D96A").with_parties("X", "Y");
        assert_eq!(registry.transaction_set(&other).unwrap().name, "Versioned");
        let old = TransactionSetKey::new("ORDERS").with_version("D93A");
        assert_eq!(registry.transaction_set(&old).unwrap().name, "Generic");
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let registry = SchemaRegistry::new();
        let err = registry.transaction_set(&TransactionSetKey::new("DESADV")).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref k) if k.starts_with("DESADV")));
    }

    #[test]
    fn test_empty_parts_are_ignored() {
        let k = TransactionSetKey::new("ORDERS").with_parties("", "").with_version("");
        assert_eq!(k, TransactionSetKey::new("ORDERS"));
        assert_eq!(k.to_string(), "ORDERS:*:*:*:*");
    }
}
