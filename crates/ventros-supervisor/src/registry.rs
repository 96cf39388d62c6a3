//! ServiceRegistry: the live mapping from service name to port.
//!
//! Written only by the supervisor, read by the gateway on every request.
//! A single parking_lot::RwLock guards the map so lookups from request
//! handlers never observe a half-applied insert or removal, and a lookup
//! that wins the race against an exit still returns a complete entry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::interpreter::Interpreter;

/// Opaque handle to a supervised process.
///
/// The process itself is owned by its watcher task; the handle can only
/// ask that task to stop it.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: u64,
    pid: Option<u32>,
    stop: Arc<Notify>,
}

impl ProcessHandle {
    pub fn new(id: u64, pid: Option<u32>, stop: Arc<Notify>) -> Self {
        Self { id, pid, stop }
    }

    /// Launch id, unique for the lifetime of the supervisor.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// OS process id. `None` while spawning and when the spawn failed.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the watcher to kill the process. The registry entry goes away
    /// through the normal exit path.
    pub fn stop(&self) {
        self.stop.notify_one();
    }
}

/// One running (or spawning) service.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub port: u16,
    pub interpreter: Interpreter,
    pub started_at: DateTime<Utc>,
    pub handle: ProcessHandle,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, port: u16, interpreter: Interpreter, handle: ProcessHandle) -> Self {
        Self {
            name: name.into(),
            port,
            interpreter,
            started_at: Utc::now(),
            handle,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "port": self.port,
            "pid": self.handle.pid(),
            "interpreter": self.interpreter,
            "startedAt": self.started_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry keyed by its name, returning any entry it replaced.
    pub fn put(&self, entry: RegistryEntry) -> Option<RegistryEntry> {
        self.entries.write().insert(entry.name.clone(), entry)
    }

    pub fn remove(&self, name: &str) -> Option<RegistryEntry> {
        self.entries.write().remove(name)
    }

    /// Remove `name` only if it still belongs to launch `id`. Used by exit
    /// handling so one exit removes its own entry at most once.
    pub fn remove_launch(&self, name: &str, id: u64) -> Option<RegistryEntry> {
        let mut entries = self.entries.write();
        match entries.get(name) {
            Some(entry) if entry.handle.id() == id => entries.remove(name),
            _ => None,
        }
    }

    /// Fill in the OS pid once launch `id` has spawned. Returns false when
    /// the entry is gone or belongs to another launch.
    pub fn record_pid(&self, name: &str, id: u64, pid: Option<u32>) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(name) {
            Some(entry) if entry.handle.id == id => {
                entry.handle.pid = pid;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.entries.read().get(name).cloned()
    }

    pub fn port(&self, name: &str) -> Option<u16> {
        self.entries.read().get(name).map(|e| e.port)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Copy of every entry, sorted by name.
    pub fn snapshot(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
