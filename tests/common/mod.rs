//! Shared mock host, resolver, and store for integration tests.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use saf_broker::{
    Config, DocumentBroker, DocumentResolver, DocumentUri, HostError, KeyValueStore,
    PermissionError, PermissionFlags, PersistedPermission, PickerHost,
};

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Record of one picker action dispatched on the mock host.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Tree {
        request_code: u32,
    },
    Open {
        request_code: u32,
        mime_types: Vec<String>,
        local_only: bool,
    },
    Create {
        request_code: u32,
        suggested_name: String,
        mime_types: Vec<String>,
        local_only: bool,
    },
}

/// Writer appending into a shared buffer.
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory document provider.
#[derive(Default)]
pub struct MockResolver {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    display_names: Mutex<HashMap<String, String>>,
    written: Mutex<HashMap<String, Arc<Mutex<Vec<u8>>>>>,
    permissions: Mutex<Vec<PersistedPermission>>,
    deny_persist: Mutex<bool>,
    deny_write: Mutex<bool>,
}

impl MockResolver {
    pub fn add_document(&self, uri: &str, content: &[u8], display_name: Option<&str>) {
        self.documents
            .lock()
            .unwrap()
            .insert(uri.to_string(), content.to_vec());
        if let Some(name) = display_name {
            self.display_names
                .lock()
                .unwrap()
                .insert(uri.to_string(), name.to_string());
        }
    }

    pub fn grant_permission(&self, uri: &str, read: bool, write: bool) {
        self.permissions.lock().unwrap().push(PersistedPermission {
            uri: DocumentUri::new(uri),
            read,
            write,
        });
    }

    pub fn permission_count(&self) -> usize {
        self.permissions.lock().unwrap().len()
    }

    pub fn deny_persist(&self) {
        *self.deny_persist.lock().unwrap() = true;
    }

    pub fn deny_write(&self) {
        *self.deny_write.lock().unwrap() = true;
    }

    pub fn written_bytes(&self, uri: &str) -> Option<Vec<u8>> {
        self.written
            .lock()
            .unwrap()
            .get(uri)
            .map(|buf| buf.lock().unwrap().clone())
    }
}

impl DocumentResolver for MockResolver {
    fn open_readable(&self, uri: &DocumentUri) -> io::Result<Box<dyn Read + Send>> {
        self.documents
            .lock()
            .unwrap()
            .get(uri.as_str())
            .cloned()
            .map(|bytes| Box::new(io::Cursor::new(bytes)) as Box<dyn Read + Send>)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such document"))
    }

    fn open_writable(&self, uri: &DocumentUri) -> io::Result<Box<dyn Write + Send>> {
        if *self.deny_write.lock().unwrap() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "write denied",
            ));
        }
        let buf = Arc::new(Mutex::new(Vec::new()));
        self.written
            .lock()
            .unwrap()
            .insert(uri.as_str().to_string(), Arc::clone(&buf));
        Ok(Box::new(SharedWriter(buf)))
    }

    fn display_name(&self, uri: &DocumentUri) -> Option<String> {
        self.display_names.lock().unwrap().get(uri.as_str()).cloned()
    }

    fn take_persistable_permission(
        &self,
        uri: &DocumentUri,
        flags: PermissionFlags,
    ) -> Result<(), PermissionError> {
        if *self.deny_persist.lock().unwrap() {
            return Err(PermissionError("provider refused".to_string()));
        }
        self.permissions.lock().unwrap().push(PersistedPermission {
            uri: uri.clone(),
            read: flags.read,
            write: flags.write,
        });
        Ok(())
    }

    fn persisted_permissions(&self) -> Vec<PersistedPermission> {
        self.permissions.lock().unwrap().clone()
    }
}

/// Mock picker surface recording every dispatch.
pub struct MockHost {
    api_level: u32,
    pub resolver: Arc<MockResolver>,
    dispatched: Mutex<Vec<Dispatched>>,
    fail_dispatch: Mutex<bool>,
}

impl MockHost {
    pub fn new(api_level: u32) -> Self {
        Self {
            api_level,
            resolver: Arc::new(MockResolver::default()),
            dispatched: Mutex::new(Vec::new()),
            fail_dispatch: Mutex::new(false),
        }
    }

    pub fn fail_dispatch(&self) {
        *self.fail_dispatch.lock().unwrap() = true;
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }

    pub fn last_dispatch(&self) -> Option<Dispatched> {
        self.dispatched.lock().unwrap().last().cloned()
    }

    fn record(&self, dispatch: Dispatched) -> Result<(), HostError> {
        if *self.fail_dispatch.lock().unwrap() {
            return Err(HostError::Dispatch("picker unavailable".to_string()));
        }
        self.dispatched.lock().unwrap().push(dispatch);
        Ok(())
    }
}

impl PickerHost for MockHost {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn resolver(&self) -> Arc<dyn DocumentResolver> {
        Arc::clone(&self.resolver) as Arc<dyn DocumentResolver>
    }

    fn open_document_tree(&self, request_code: u32) -> Result<(), HostError> {
        self.record(Dispatched::Tree { request_code })
    }

    fn open_document(
        &self,
        request_code: u32,
        mime_types: &[String],
        local_only: bool,
    ) -> Result<(), HostError> {
        self.record(Dispatched::Open {
            request_code,
            mime_types: mime_types.to_vec(),
            local_only,
        })
    }

    fn create_document(
        &self,
        request_code: u32,
        suggested_name: &str,
        mime_types: &[String],
        local_only: bool,
    ) -> Result<(), HostError> {
        self.record(Dispatched::Create {
            request_code,
            suggested_name: suggested_name.to_string(),
            mime_types: mime_types.to_vec(),
            local_only,
        })
    }
}

/// Config rooted in a test directory.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.broker.data_dir = root.join("data");
    config.transfer.cache_dir = root.join("cache");
    config
}

/// Broker wired to a fresh mock host and in-memory store.
pub fn test_broker(root: &Path, api_level: u32) -> (DocumentBroker, Arc<MockHost>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let broker = DocumentBroker::new(test_config(root), Arc::clone(&store) as Arc<dyn KeyValueStore>);
    let host = Arc::new(MockHost::new(api_level));
    broker.attach_host(Arc::clone(&host) as Arc<dyn PickerHost>);
    (broker, host, store)
}

/// Polls `condition` until it holds or a timeout elapses.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
