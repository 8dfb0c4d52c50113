//! # SAF Broker
//!
//! Single-flight broker for scoped-storage picker operations: pick a
//! directory, pick a file, save a file. Access to files is granted
//! transiently by an external storage provider via opaque location handles
//! rather than paths; this crate owns the pending-operation state machine
//! that sits between the application and that provider.
//!
//! ## Overview
//!
//! - **At most one operation in flight.** A second request while one is
//!   pending is rejected with `already_active`, never queued.
//! - **Dispatch now, resolve later.** Picker actions return immediately;
//!   the host reports the outcome once through
//!   [`DocumentBroker::handle_picker_result`], which correlates it back to
//!   the waiting caller via a one-shot completion slot.
//! - **Grants survive restarts.** The most recently granted directory tree
//!   is persisted as a key-value pair and revalidated against the process's
//!   live permissions on every read.
//! - **Transfers run off the reply path.** Copy-in (picked file to local
//!   cache) and copy-out (local source to picked destination) stream on a
//!   background thread.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► DocumentBroker ──► PickerHost (external UI surface)
//!                 │                   │
//!                 │    handle_picker_result(request_code, outcome)
//!                 │◄──────────────────┘
//!                 ├── GrantStore ──► KeyValueStore (durable)
//!                 ├── filter (name normalization, allow-list)
//!                 └── transfer ──► DocumentResolver (provider streams)
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use saf_broker::{Config, DocumentBroker, FileStore};
//!
//! let config = Config::load_or_default()?;
//! let store = Arc::new(FileStore::open(config.store_path())?);
//! let broker = DocumentBroker::new(config, store);
//!
//! // No host attached yet, so the tree picker is unsupported.
//! assert!(!broker.is_pick_directory_supported());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod broker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod grants;
pub mod provider;
pub mod session;
pub mod store;
pub mod transfer;

pub use broker::{DocumentBroker, PickFileOptions, SaveFileOptions};
pub use config::{Config, ConfigError};
pub use dispatch::CompletionSlot;
pub use error::BrokerError;
pub use grants::{Grant, GrantStore, TREE_GRANT_KEY};
pub use provider::{
    DocumentResolver, DocumentUri, HostError, KeyValueStore, PermissionError, PermissionFlags,
    PersistedPermission, PickerHost, PickerOutcome, MIN_TREE_API_LEVEL, REQUEST_PICK_DIRECTORY,
    REQUEST_PICK_FILE, REQUEST_SAVE_FILE,
};
pub use session::{OperationKind, SourceFile};
pub use store::FileStore;
pub use transfer::TransferError;
