//! The coordinating object for single-flight picker operations.
//!
//! A [`DocumentBroker`] admits at most one user-mediated operation at a
//! time, dispatches the matching picker action on the attached host, and
//! waits for the host to report the outcome through
//! [`handle_picker_result`](DocumentBroker::handle_picker_result). Follow-up
//! data transfers (copy-in, copy-out) run on a background thread so the
//! reply context never blocks on IO.

use std::fs;
use std::io;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::BrokerError;
use crate::filter;
use crate::grants::GrantStore;
use crate::provider::{
    KeyValueStore, PickerHost, PickerOutcome, MIN_TREE_API_LEVEL, REQUEST_PICK_DIRECTORY,
    REQUEST_PICK_FILE, REQUEST_SAVE_FILE,
};
use crate::session::{ActiveSession, OperationKind, SessionResult, SessionSlot, SourceFile};
use crate::transfer::{self, TransferError};

/// Options for [`DocumentBroker::pick_file`].
#[derive(Debug, Clone, Default)]
pub struct PickFileOptions {
    /// Case-insensitive extension allow-list; empty admits everything.
    pub extension_filter: Vec<String>,
    /// MIME constraint passed to the picker.
    pub mime_types: Vec<String>,
    /// Restrict the picker to locally-available documents.
    pub local_only: bool,
    /// Copy the picked document into the local cache directory.
    pub copy_to_cache_dir: bool,
}

/// Options for [`DocumentBroker::save_file`].
///
/// Exactly one of `source_path` / `data` must be supplied.
#[derive(Debug, Clone, Default)]
pub struct SaveFileOptions {
    /// Existing local file to stream to the destination.
    pub source_path: Option<std::path::PathBuf>,
    /// Raw bytes to stage and stream to the destination.
    pub data: Option<Vec<u8>>,
    /// Suggested destination file name.
    pub file_name: Option<String>,
    /// MIME constraint passed to the picker.
    pub mime_types: Vec<String>,
    /// Restrict the picker to locally-available destinations.
    pub local_only: bool,
}

struct Inner {
    host: RwLock<Option<Arc<dyn PickerHost>>>,
    session: SessionSlot,
    grants: GrantStore,
    config: Config,
}

/// Single-flight broker for scoped-storage picker operations.
///
/// Cheap to clone; clones share the same session slot and grant store.
#[derive(Clone)]
pub struct DocumentBroker {
    inner: Arc<Inner>,
}

impl DocumentBroker {
    /// Creates a broker with no host attached.
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                host: RwLock::new(None),
                session: SessionSlot::new(),
                grants: GrantStore::new(store),
                config,
            }),
        }
    }

    /// Attaches the host providing the picker surface and content resolution.
    pub fn attach_host(&self, host: Arc<dyn PickerHost>) {
        if let Ok(mut guard) = self.inner.host.write() {
            debug!(api_level = host.api_level(), "host attached");
            *guard = Some(host);
        }
    }

    /// Detaches the host. Subsequent dispatches and replies resolve with an
    /// internal error until a host is re-attached.
    pub fn detach_host(&self) {
        if let Ok(mut guard) = self.inner.host.write() {
            debug!("host detached");
            *guard = None;
        }
    }

    fn host(&self) -> Option<Arc<dyn PickerHost>> {
        self.inner.host.read().ok().and_then(|guard| guard.clone())
    }

    /// Whether the attached host supports the document-tree picker.
    pub fn is_pick_directory_supported(&self) -> bool {
        self.host()
            .map(|h| h.api_level() >= MIN_TREE_API_LEVEL)
            .unwrap_or(false)
    }

    /// Whether an operation is currently pending.
    pub fn is_busy(&self) -> bool {
        self.inner.session.is_pending()
    }

    /// Picks a directory tree, persisting the grant for later restarts.
    ///
    /// Resolves with the tree handle's string form, or `None` on user
    /// cancellation. When a previously persisted grant still holds read and
    /// write permission, resolves with it immediately and never opens a
    /// picker.
    pub async fn pick_directory(&self) -> Result<Option<String>, BrokerError> {
        let rx = self
            .inner
            .session
            .admit(ActiveSession::new(OperationKind::PickDirectory))?;
        self.dispatch_pick_directory();
        await_resolution(rx).await
    }

    /// Picks an openable document.
    ///
    /// Resolves with the picked handle's string form, or the local cache
    /// path when `copy_to_cache_dir` is set, or `None` on user cancellation.
    pub async fn pick_file(&self, options: PickFileOptions) -> Result<Option<String>, BrokerError> {
        let session = ActiveSession {
            kind: OperationKind::PickFile,
            extension_filter: options.extension_filter.clone(),
            copy_to_cache: options.copy_to_cache_dir,
            source: None,
        };
        let rx = self.inner.session.admit(session)?;

        match self.host() {
            None => self.fail_pending(BrokerError::internal("host context unavailable")),
            Some(host) => {
                if let Err(e) =
                    host.open_document(REQUEST_PICK_FILE, &options.mime_types, options.local_only)
                {
                    warn!(error = %e, "open-document dispatch failed");
                    self.fail_pending(BrokerError::internal(e.to_string()));
                }
            }
        }
        await_resolution(rx).await
    }

    /// Saves a local source to a picked destination.
    ///
    /// Resolves with the destination handle's string form, or `None` on user
    /// cancellation. A staging file created for raw bytes is deleted on
    /// every resolution path.
    pub async fn save_file(&self, options: SaveFileOptions) -> Result<Option<String>, BrokerError> {
        let rx = self
            .inner
            .session
            .admit(ActiveSession::new(OperationKind::SaveFile))?;
        self.dispatch_save_file(options);
        await_resolution(rx).await
    }

    fn dispatch_pick_directory(&self) {
        let Some(host) = self.host() else {
            self.fail_pending(BrokerError::internal("host context unavailable"));
            return;
        };

        let api_level = host.api_level();
        if api_level < MIN_TREE_API_LEVEL {
            self.fail_pending(BrokerError::MinimumTarget {
                required: MIN_TREE_API_LEVEL,
                actual: api_level,
            });
            return;
        }

        // Zero-UI fast path when a persisted grant still revalidates.
        if let Some(grant) = self.inner.grants.get(host.resolver().as_ref()) {
            info!(uri = %grant.uri, "reusing persisted tree grant, skipping picker");
            self.inner
                .session
                .resolve(Ok(Some(grant.uri.to_string())));
            return;
        }

        if let Err(e) = host.open_document_tree(REQUEST_PICK_DIRECTORY) {
            warn!(error = %e, "document-tree dispatch failed");
            self.fail_pending(BrokerError::internal(e.to_string()));
        }
    }

    fn dispatch_save_file(&self, options: SaveFileOptions) {
        let source = match (options.source_path, options.data) {
            (Some(path), None) => {
                if !path.exists() {
                    self.fail_pending(BrokerError::FileNotFound(path));
                    return;
                }
                SourceFile::existing(path)
            }
            (None, Some(bytes)) => match self.write_staging_file(&bytes) {
                Ok(source) => source,
                Err(e) => {
                    warn!(error = %e, "failed to stage save data");
                    self.fail_pending(BrokerError::SaveFileFailed {
                        message: e.to_string(),
                    });
                    return;
                }
            },
            _ => {
                self.fail_pending(BrokerError::internal(
                    "exactly one of source_path / data must be supplied",
                ));
                return;
            }
        };

        let suggested_name = options
            .file_name
            .or_else(|| {
                source
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "untitled".to_string());
        self.inner.session.set_source(source);

        let Some(host) = self.host() else {
            self.fail_pending(BrokerError::internal("host context unavailable"));
            return;
        };
        if let Err(e) = host.create_document(
            REQUEST_SAVE_FILE,
            &suggested_name,
            &options.mime_types,
            options.local_only,
        ) {
            warn!(error = %e, "create-document dispatch failed");
            self.fail_pending(BrokerError::internal(e.to_string()));
        }
    }

    /// Entry point for the external picker's asynchronous reply.
    ///
    /// The host calls this exactly once per dispatched action. A reply with
    /// no pending session is logged and dropped; a reply whose request code
    /// does not match the pending session's kind resolves it with an
    /// internal error.
    pub fn handle_picker_result(&self, request_code: u32, outcome: PickerOutcome) {
        let Some(session) = self.inner.session.take_active() else {
            warn!(request_code, "picker reply with no pending session");
            return;
        };

        if session.kind.request_code() != request_code {
            warn!(
                request_code,
                expected = session.kind.request_code(),
                "picker reply request code does not match pending session"
            );
            if let Some(source) = &session.source {
                source.cleanup();
            }
            self.inner
                .session
                .resolve(Err(BrokerError::internal("request code mismatch")));
            return;
        }

        let Some(host) = self.host() else {
            if let Some(source) = &session.source {
                source.cleanup();
            }
            self.inner
                .session
                .resolve(Err(BrokerError::internal("host context unavailable")));
            return;
        };

        match session.kind {
            OperationKind::PickDirectory => self.complete_pick_directory(&host, outcome),
            OperationKind::PickFile => self.complete_pick_file(&host, session, outcome),
            OperationKind::SaveFile => self.complete_save_file(&host, session, outcome),
        }
    }

    fn complete_pick_directory(&self, host: &Arc<dyn PickerHost>, outcome: PickerOutcome) {
        match outcome {
            PickerOutcome::Ok {
                handle: Some(uri),
                flags,
            } => {
                self.inner.grants.put(host.resolver().as_ref(), &uri, flags);
                info!(uri = %uri, "directory tree granted");
                self.inner.session.resolve(Ok(Some(uri.to_string())));
            }
            PickerOutcome::Ok { handle: None, .. } | PickerOutcome::Cancelled => {
                debug!("directory pick cancelled");
                self.inner.session.resolve(Ok(None));
            }
        }
    }

    fn complete_pick_file(
        &self,
        host: &Arc<dyn PickerHost>,
        session: ActiveSession,
        outcome: PickerOutcome,
    ) {
        let uri = match outcome {
            PickerOutcome::Ok {
                handle: Some(uri), ..
            } => uri,
            PickerOutcome::Ok { handle: None, .. } | PickerOutcome::Cancelled => {
                debug!("file pick cancelled");
                self.inner.session.resolve(Ok(None));
                return;
            }
        };

        let resolver = host.resolver();
        let display = resolver
            .display_name(&uri)
            .or_else(|| uri.last_segment().map(str::to_string))
            .unwrap_or_else(|| "document".to_string());
        let name = filter::normalize_name(&display);

        if !filter::is_allowed(Some(&name), &session.extension_filter) {
            let extension = filter::extension_of(&name).to_string();
            debug!(name = %name, extension = %extension, "picked file rejected by extension filter");
            self.inner
                .session
                .resolve(Err(BrokerError::InvalidFileExtension { extension }));
            return;
        }

        if !session.copy_to_cache {
            self.inner.session.resolve(Ok(Some(uri.to_string())));
            return;
        }

        let destination = self.inner.config.cache_dir().join(&name);
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            match transfer::copy_in(resolver.as_ref(), &uri, &destination) {
                Ok(bytes) => {
                    debug!(bytes, path = %destination.display(), "picked file copied into cache");
                    inner
                        .session
                        .resolve(Ok(Some(destination.to_string_lossy().into_owned())));
                }
                Err(e) => {
                    warn!(uri = %uri, error = %e, "copy into cache failed");
                    inner.session.resolve(Err(BrokerError::FileCopyFailed {
                        message: e.to_string(),
                    }));
                }
            }
        });
    }

    fn complete_save_file(
        &self,
        host: &Arc<dyn PickerHost>,
        session: ActiveSession,
        outcome: PickerOutcome,
    ) {
        let uri = match outcome {
            PickerOutcome::Ok {
                handle: Some(uri),
                flags,
            } => {
                // Destination durability is best-effort only.
                if let Err(e) = host
                    .resolver()
                    .take_persistable_permission(&uri, flags)
                {
                    warn!(uri = %uri, error = %e, "could not take persistable permission on save destination");
                }
                uri
            }
            PickerOutcome::Ok { handle: None, .. } | PickerOutcome::Cancelled => {
                debug!("save cancelled");
                if let Some(source) = &session.source {
                    source.cleanup();
                }
                self.inner.session.resolve(Ok(None));
                return;
            }
        };

        let Some(source) = session.source else {
            self.inner
                .session
                .resolve(Err(BrokerError::internal("save session has no source file")));
            return;
        };

        let resolver = host.resolver();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            let result = transfer::copy_out(resolver.as_ref(), &source.path, &uri);
            // The staging file goes away whatever the transfer did.
            source.cleanup();
            match result {
                Ok(bytes) => {
                    info!(bytes, uri = %uri, "file saved to destination");
                    inner.session.resolve(Ok(Some(uri.to_string())));
                }
                Err(e @ TransferError::DestinationUnavailable { .. }) => {
                    warn!(uri = %uri, error = %e, "save destination refused");
                    inner.session.resolve(Err(BrokerError::SecurityException {
                        message: e.to_string(),
                    }));
                }
                Err(e) => {
                    warn!(uri = %uri, error = %e, "save transfer failed");
                    inner.session.resolve(Err(BrokerError::SaveFileFailed {
                        message: e.to_string(),
                    }));
                }
            }
        });
    }

    /// Resolves the pending operation with `err`, cleaning up any staging file.
    fn fail_pending(&self, err: BrokerError) {
        if let Some(session) = self.inner.session.take_active() {
            if let Some(source) = &session.source {
                source.cleanup();
            }
        }
        self.inner.session.resolve(Err(err));
    }

    /// Writes raw save bytes to a fresh staging file.
    fn write_staging_file(&self, bytes: &[u8]) -> io::Result<SourceFile> {
        let dir = self.inner.config.staging_dir();
        fs::create_dir_all(&dir)?;
        let name = staging_file_name();
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "staged save data");
        Ok(SourceFile::temporary(path))
    }
}

/// Unique staging file name.
fn staging_file_name() -> String {
    format!(
        "staged_{:x}_{}.bin",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
        rand::random::<u32>()
    )
}

/// Awaits the session's resolution.
async fn await_resolution(
    rx: oneshot::Receiver<SessionResult>,
) -> Result<Option<String>, BrokerError> {
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(BrokerError::internal("completion channel dropped")),
    }
}
