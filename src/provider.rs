//! Host-boundary traits and types.
//!
//! The broker never touches provider-held documents directly. The external
//! picker surface, stream access, and durable key-value persistence are all
//! reached through the traits defined here, so the core state machine can be
//! driven by mock implementations in tests.

use std::fmt;
use std::io::{Read, Write};

use thiserror::Error;

/// Request code correlating a document-tree picker reply.
pub const REQUEST_PICK_DIRECTORY: u32 = 10001;

/// Request code correlating an open-document picker reply.
pub const REQUEST_PICK_FILE: u32 = 10002;

/// Request code correlating a create-document picker reply.
pub const REQUEST_SAVE_FILE: u32 = 10003;

/// Minimum host API level for the document-tree picker.
pub const MIN_TREE_API_LEVEL: u32 = 21;

/// Opaque location handle minted by the storage provider.
///
/// Not a filesystem path; the underlying resource is owned entirely by the
/// provider and is only reachable through a [`DocumentResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentUri(String);

impl DocumentUri {
    /// Creates a handle from its provider string form.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The provider string form of the handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment of the handle, if any.
    ///
    /// Used as a display-name fallback when the provider does not report one.
    pub fn last_segment(&self) -> Option<&str> {
        self.0.rsplit('/').find(|s| !s.is_empty())
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentUri {
    fn from(uri: &str) -> Self {
        Self(uri.to_string())
    }
}

impl From<String> for DocumentUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

/// Read/write access flags carried on a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionFlags {
    /// Read access.
    pub read: bool,
    /// Write access.
    pub write: bool,
}

impl PermissionFlags {
    /// Full read and write access.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };
}

/// A permission entry currently held by the process.
#[derive(Debug, Clone)]
pub struct PersistedPermission {
    /// The handle the permission applies to.
    pub uri: DocumentUri,
    /// Read access held.
    pub read: bool,
    /// Write access held.
    pub write: bool,
}

/// Outcome reported by the external picker for a dispatched action.
#[derive(Debug)]
pub enum PickerOutcome {
    /// The picker completed; a missing handle is treated like cancellation.
    Ok {
        /// The picked location, if the provider returned one.
        handle: Option<DocumentUri>,
        /// Access flags granted alongside the handle.
        flags: PermissionFlags,
    },
    /// The user dismissed the picker.
    Cancelled,
}

/// Errors reported by the host when dispatching a picker action.
#[derive(Debug, Error)]
pub enum HostError {
    /// The picker action could not be started.
    #[error("picker dispatch failed: {0}")]
    Dispatch(String),

    /// The hosting context is gone.
    #[error("host context unavailable")]
    Unavailable,
}

/// Failure to convert a transient grant into a persistable one.
///
/// Always swallowed by the broker; grant durability is best-effort.
#[derive(Debug, Error)]
#[error("permission grant failed: {0}")]
pub struct PermissionError(pub String);

/// The external picker surface.
///
/// Each dispatch returns immediately; the host later reports the outcome by
/// calling [`DocumentBroker::handle_picker_result`] exactly once with the
/// same request code.
///
/// [`DocumentBroker::handle_picker_result`]: crate::DocumentBroker::handle_picker_result
pub trait PickerHost: Send + Sync {
    /// Platform capability level reported by the host.
    fn api_level(&self) -> u32;

    /// Content-resolution surface for the host's storage provider.
    fn resolver(&self) -> std::sync::Arc<dyn DocumentResolver>;

    /// Opens the document-tree picker.
    fn open_document_tree(&self, request_code: u32) -> std::result::Result<(), HostError>;

    /// Opens the openable-document picker with a MIME constraint.
    fn open_document(
        &self,
        request_code: u32,
        mime_types: &[String],
        local_only: bool,
    ) -> std::result::Result<(), HostError>;

    /// Opens the create-document picker with a suggested file name.
    fn create_document(
        &self,
        request_code: u32,
        suggested_name: &str,
        mime_types: &[String],
        local_only: bool,
    ) -> std::result::Result<(), HostError>;
}

/// Provider-mediated stream and permission access for document handles.
pub trait DocumentResolver: Send + Sync {
    /// Opens a readable stream on the handle.
    fn open_readable(&self, uri: &DocumentUri) -> std::io::Result<Box<dyn Read + Send>>;

    /// Opens a writable stream on the handle.
    fn open_writable(&self, uri: &DocumentUri) -> std::io::Result<Box<dyn Write + Send>>;

    /// Queries the provider-supplied display name for the handle.
    fn display_name(&self, uri: &DocumentUri) -> Option<String>;

    /// Converts the transient grant on the handle into a persistable one.
    fn take_persistable_permission(
        &self,
        uri: &DocumentUri,
        flags: PermissionFlags,
    ) -> std::result::Result<(), PermissionError>;

    /// Lists the persisted permissions currently held by the process.
    fn persisted_permissions(&self) -> Vec<PersistedPermission>;
}

/// Durable string-to-string persistence surface.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value, or `None` if the key was never set.
    fn get(&self, key: &str) -> Option<String>;

    /// Durably records a value under the key.
    fn put(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
