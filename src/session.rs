//! Pending-operation state for the single in-flight picker session.
//!
//! The broker admits at most one user-mediated operation at a time. A
//! [`SessionSlot`] pairs the completion slot with the session record the
//! eventual external reply needs: the operation kind, filter and copy
//! preferences, and the save source. A second admission attempt while one is
//! pending is rejected, not queued.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::dispatch::CompletionSlot;
use crate::error::BrokerError;
use crate::provider::{REQUEST_PICK_DIRECTORY, REQUEST_PICK_FILE, REQUEST_SAVE_FILE};

/// The kind of user-mediated operation a session is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Pick a directory tree.
    PickDirectory,
    /// Pick an openable document.
    PickFile,
    /// Create a document and stream a local source into it.
    SaveFile,
}

impl OperationKind {
    /// The request code used to correlate this kind's picker reply.
    pub fn request_code(&self) -> u32 {
        match self {
            Self::PickDirectory => REQUEST_PICK_DIRECTORY,
            Self::PickFile => REQUEST_PICK_FILE,
            Self::SaveFile => REQUEST_SAVE_FILE,
        }
    }
}

/// Local file feeding a save operation.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path of the source on the local filesystem.
    pub path: PathBuf,
    /// Whether the file is a staging file owned by the session.
    pub is_temporary: bool,
}

impl SourceFile {
    /// A caller-supplied file that outlives the session.
    pub fn existing(path: PathBuf) -> Self {
        Self {
            path,
            is_temporary: false,
        }
    }

    /// A staging file created for raw bytes, deleted when the session resolves.
    pub fn temporary(path: PathBuf) -> Self {
        Self {
            path,
            is_temporary: true,
        }
    }

    /// Deletes the staging file if this source is temporary.
    ///
    /// Runs on every resolution path of a save, regardless of outcome.
    pub fn cleanup(&self) {
        if !self.is_temporary {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed staging file"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staging file"),
        }
    }
}

/// Record of the one admitted operation.
#[derive(Debug)]
pub struct ActiveSession {
    /// Operation kind, fixed at admission.
    pub kind: OperationKind,
    /// Case-insensitive extension allow-list for picked files.
    pub extension_filter: Vec<String>,
    /// Whether a picked file is copied into the local cache.
    pub copy_to_cache: bool,
    /// Save source, set after admission once resolved.
    pub source: Option<SourceFile>,
}

impl ActiveSession {
    /// Creates a session record with no filter or copy preferences.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            extension_filter: Vec::new(),
            copy_to_cache: false,
            source: None,
        }
    }
}

/// Outcome delivered to the original caller: a path/URI string, absent on
/// user cancellation, or a broker error.
pub type SessionResult = Result<Option<String>, BrokerError>;

/// Single-flight admission gate.
///
/// Holds the completion slot and the active session record together. The
/// slot alone enforces single-flight semantics; the record carries what the
/// external reply needs to finish the operation.
pub struct SessionSlot {
    slot: CompletionSlot<SessionResult>,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionSlot {
    /// Creates an idle slot.
    pub fn new() -> Self {
        Self {
            slot: CompletionSlot::new(),
            active: Mutex::new(None),
        }
    }

    /// Admits a new operation, arming the completion slot.
    ///
    /// Fails with [`BrokerError::AlreadyActive`] when an operation is
    /// pending; the in-flight session is left untouched.
    pub fn admit(
        &self,
        session: ActiveSession,
    ) -> Result<oneshot::Receiver<SessionResult>, BrokerError> {
        let rx = self.slot.register().ok_or(BrokerError::AlreadyActive)?;
        debug!(kind = ?session.kind, "admitted picker operation");
        if let Ok(mut guard) = self.active.lock() {
            *guard = Some(session);
        }
        Ok(rx)
    }

    /// Records the save source on the active session.
    pub fn set_source(&self, source: SourceFile) {
        if let Ok(mut guard) = self.active.lock() {
            if let Some(session) = guard.as_mut() {
                session.source = Some(source);
            }
        }
    }

    /// Takes the pending session record, leaving the slot armed.
    ///
    /// The external reply handler calls this once; the slot itself is
    /// cleared by the eventual [`resolve`](Self::resolve).
    pub fn take_active(&self) -> Option<ActiveSession> {
        self.active.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Whether an operation is pending.
    pub fn is_pending(&self) -> bool {
        self.slot.is_occupied()
    }

    /// Resolves the pending operation, clearing slot and record.
    ///
    /// A no-op when nothing is pending, so duplicate replies are harmless.
    pub fn resolve(&self, result: SessionResult) -> bool {
        if let Ok(mut guard) = self.active.lock() {
            guard.take();
        }
        self.slot.resolve(result)
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}
