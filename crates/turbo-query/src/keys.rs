//! Per-domain key builders.
//!
//! Every domain lays its keys out the same way:
//!
//! ```text
//! [ns.., domain]                          all
//! [ns.., domain, "list"]                  lists
//! [ns.., domain, "list", {params}, {page}] one list
//! [ns.., domain, "detail"]                details
//! [ns.., domain, "detail", id]            one entity, any params
//! [ns.., domain, "detail", id, {params}]  one detail read
//! [ns.., domain, kind, ..parts]           anything else
//! ```

use serde::Serialize;
use turbo_cache::{Canonicalizer, KeyError, KeyPart, Namespace, QueryKey};
use turbo_data::ListRequest;

/// Key builder for one domain.
#[derive(Debug, Clone)]
pub struct DomainKeys {
    namespace: Namespace,
    domain: String,
    canonicalizer: Canonicalizer,
}

impl DomainKeys {
    /// Create a key builder.
    pub fn new(namespace: Namespace, domain: impl Into<String>) -> Self {
        Self {
            namespace,
            domain: domain.into(),
            canonicalizer: Canonicalizer::default(),
        }
    }

    /// Use a different canonicalizer.
    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Get the domain name.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Get the namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Prefix of every key in the domain.
    pub fn all(&self) -> QueryKey {
        self.namespace.key().with(self.domain.as_str())
    }

    /// Prefix of every list key.
    pub fn lists(&self) -> QueryKey {
        self.kind("list")
    }

    /// Key of one list read.
    ///
    /// Filters and paging are separate segments so the ignore set applies
    /// to the caller's filter members.
    pub fn list<P: Serialize>(&self, request: &ListRequest<P>) -> Result<QueryKey, KeyError> {
        let page = KeyPart::object([
            ("limit", request.limit.map_or(KeyPart::Undefined, KeyPart::from)),
            ("offset", request.offset.map_or(KeyPart::Undefined, KeyPart::from)),
        ]);
        Ok(self
            .lists()
            .with(self.canonicalizer.canonicalize_serialize(&request.params)?)
            .with(self.canonicalizer.canonicalize(&page)?))
    }

    /// Prefix of every detail key.
    pub fn details(&self) -> QueryKey {
        self.kind("detail")
    }

    /// Prefix of every detail key for one entity.
    pub fn detail_prefix(&self, id: &str) -> QueryKey {
        self.details().with(id)
    }

    /// Key of one detail read.
    pub fn detail<P: Serialize + ?Sized>(&self, id: &str, params: &P) -> Result<QueryKey, KeyError> {
        Ok(self
            .detail_prefix(id)
            .with(self.canonicalizer.canonicalize_serialize(params)?))
    }

    /// Prefix for an operation kind.
    pub fn kind(&self, kind: &str) -> QueryKey {
        self.all().with(kind)
    }

    /// Key for an operation kind with extra canonicalized parts.
    pub fn scoped(&self, kind: &str, parts: &[KeyPart]) -> Result<QueryKey, KeyError> {
        let mut key = self.kind(kind);
        for part in parts {
            key = key.with(self.canonicalizer.canonicalize(part)?);
        }
        Ok(key)
    }
}
