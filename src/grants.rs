//! Persisted directory-tree grant storage and revalidation.
//!
//! A single long-lived tree grant survives process restarts as one
//! key-value pair: a constant namespace key mapped to the opaque URI string
//! of the most recently granted tree. The grant is only handed back to
//! callers after proving the process still holds read and write permission
//! on it; a revoked grant reads as absent, never as an error.

use tracing::{debug, warn};

use crate::provider::{DocumentResolver, DocumentUri, KeyValueStore, PermissionFlags};

/// Namespace key for the persisted tree grant.
pub const TREE_GRANT_KEY: &str = "saf-broker.tree-uri";

/// A revalidated capability for a directory tree.
#[derive(Debug, Clone)]
pub struct Grant {
    /// The granted tree's handle.
    pub uri: DocumentUri,
}

/// Persists and revalidates the single tree grant.
pub struct GrantStore {
    store: std::sync::Arc<dyn KeyValueStore>,
    key: String,
}

impl GrantStore {
    /// Creates a store using the default namespace key.
    pub fn new(store: std::sync::Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, TREE_GRANT_KEY)
    }

    /// Creates a store with a custom key.
    pub fn with_key(store: std::sync::Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the persisted grant if the process still holds read and
    /// write permission on it.
    ///
    /// A recorded URI whose permission has been externally revoked is
    /// treated as absent; the record is left in place for a later re-grant.
    pub fn get(&self, resolver: &dyn DocumentResolver) -> Option<Grant> {
        let uri = DocumentUri::from(self.store.get(&self.key)?);
        let live = resolver
            .persisted_permissions()
            .iter()
            .any(|p| p.uri == uri && p.read && p.write);
        if live {
            debug!(uri = %uri, "persisted tree grant revalidated");
            Some(Grant { uri })
        } else {
            debug!(uri = %uri, "persisted tree grant no longer holds read+write");
            None
        }
    }

    /// Best-effort persists a grant for the given tree.
    ///
    /// Attempts to convert the transient grant into a persistable one using
    /// the read/write intersection of `flags`; a permission failure is
    /// logged and swallowed. The URI string is recorded under the key
    /// regardless, so the link survives even when only a non-persistable
    /// grant was obtained (it simply fails revalidation next time).
    pub fn put(&self, resolver: &dyn DocumentResolver, uri: &DocumentUri, flags: PermissionFlags) {
        if let Err(e) = resolver.take_persistable_permission(uri, flags) {
            warn!(uri = %uri, error = %e, "could not take persistable permission on tree grant");
        }
        if let Err(e) = self.store.put(&self.key, uri.as_str()) {
            warn!(uri = %uri, error = %e, "could not record tree grant");
        }
    }
}
