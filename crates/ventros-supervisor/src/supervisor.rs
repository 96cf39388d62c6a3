//! ServiceSupervisor: launches every service under a services root and
//! keeps the registry in step with the processes.
//!
//! Each service directory gets its own task: discover the entrypoint,
//! allocate a port, register, spawn. A per-process watcher task owns the
//! child, forwards its output to the log, and removes the registry entry
//! when the child exits. Nothing is ever restarted.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Notify, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use ventros_protocol::{Notifications, RpcNotification};

use crate::error::SupervisorError;
use crate::interpreter::ServiceDescriptor;
use crate::port::{DEFAULT_MAX_ATTEMPTS, LoopbackProbe, PortAllocator, PortProbe, PortRange};
use crate::registry::{ProcessHandle, RegistryEntry, ServiceRegistry};

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Directory whose immediate subdirectories are services.
    pub services_dir: PathBuf,
    pub port_range: PortRange,
    pub max_attempts: usize,
}

impl SupervisorConfig {
    pub fn new(services_dir: impl Into<PathBuf>) -> Self {
        Self {
            services_dir: services_dir.into(),
            port_range: PortRange::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

pub struct ServiceSupervisor<P: PortProbe = LoopbackProbe> {
    services_dir: PathBuf,
    allocator: PortAllocator<P>,
    registry: Arc<ServiceRegistry>,
    /// Watcher task per launched service.
    watchers: DashMap<String, JoinHandle<()>>,
    next_id: AtomicU64,
    notification_tx: Option<broadcast::Sender<String>>,
}

impl ServiceSupervisor<LoopbackProbe> {
    pub fn new(config: SupervisorConfig, registry: Arc<ServiceRegistry>) -> Self {
        Self::with_probe(config, registry, LoopbackProbe)
    }
}

impl<P: PortProbe> ServiceSupervisor<P> {
    pub fn with_probe(config: SupervisorConfig, registry: Arc<ServiceRegistry>, probe: P) -> Self {
        Self {
            allocator: PortAllocator::with_probe(config.port_range, config.max_attempts, probe),
            services_dir: config.services_dir,
            registry,
            watchers: DashMap::new(),
            next_id: AtomicU64::new(1),
            notification_tx: None,
        }
    }

    /// Set the channel used to broadcast `service/*` notifications.
    pub fn set_notification_sender(&mut self, tx: broadcast::Sender<String>) {
        self.notification_tx = Some(tx);
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn services_dir(&self) -> &Path {
        &self.services_dir
    }

    /// Launch every service under the services root.
    ///
    /// Returns once every spawn attempt has been issued, not once the
    /// services are listening. A missing services root is not an error.
    /// Returns the number of services registered.
    pub async fn start_all(self: &Arc<Self>) -> usize {
        let dirs = match service_dirs(&self.services_dir).await {
            Ok(dirs) => dirs,
            Err(e) => {
                debug!("{e}");
                return 0;
            }
        };

        let mut launches = JoinSet::new();
        for dir in dirs {
            let this = Arc::clone(self);
            launches.spawn(async move { this.launch(&dir).await });
        }

        let mut launched = 0;
        while let Some(joined) = launches.join_next().await {
            match joined {
                Ok(Ok(Some(_))) => launched += 1,
                Ok(Ok(None)) => {}
                Ok(Err(e @ SupervisorError::Spawn { .. })) => error!("{e}"),
                Ok(Err(e)) => warn!("{e}"),
                Err(e) => error!("Service launch task failed: {e}"),
            }
        }

        info!("Service supervisor started {launched} service(s)");
        launched
    }

    /// Launch a single service directory. `Ok(None)` means the directory
    /// is not a service or is already registered.
    ///
    /// A spawn failure is returned as [`SupervisorError::Spawn`], but the
    /// entry stays registered without a pid.
    pub async fn launch(self: &Arc<Self>, dir: &Path) -> Result<Option<u16>, SupervisorError> {
        let Some(descriptor) = ServiceDescriptor::discover(dir).await else {
            return Ok(None);
        };

        if self.registry.contains(&descriptor.name) {
            debug!("Service already registered: {}", descriptor.name);
            return Ok(None);
        }

        let port = self.allocator.allocate().await.map_err(|source| SupervisorError::Port {
            name: descriptor.name.clone(),
            source,
        })?;

        self.spawn_service(descriptor, port)?;
        Ok(Some(port))
    }

    /// Kill every supervised process and wait for its watcher to finish.
    pub async fn shutdown_all(&self) {
        for entry in self.registry.snapshot() {
            entry.handle.stop();
        }

        let names: Vec<String> = self.watchers.iter().map(|w| w.key().clone()).collect();
        for name in names {
            if let Some((_, watcher)) = self.watchers.remove(&name) {
                let _ = watcher.await;
            }
        }

        // Entries left behind by failed spawns have no watcher.
        for entry in self.registry.snapshot() {
            self.registry.remove_launch(&entry.name, entry.handle.id());
        }

        info!("All services stopped");
    }

    // ── Internal ──────────────────────────────────────────────────────────

    fn spawn_service(self: &Arc<Self>, descriptor: ServiceDescriptor, port: u16) -> Result<(), SupervisorError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(Notify::new());
        let name = descriptor.name.clone();
        let program = descriptor.interpreter.program();

        // Routable before the child exists, so its exit always finds the entry.
        let handle = ProcessHandle::new(id, None, stop.clone());
        self.registry.put(RegistryEntry::new(name.clone(), port, descriptor.interpreter, handle));

        let mut child = Command::new(program)
            .arg(descriptor.entrypoint_file())
            .arg(port.to_string())
            .current_dir(&descriptor.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                name: name.clone(),
                program: program.to_string(),
                source,
            })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(name.clone(), stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(name.clone(), stderr, true));
        }

        self.registry.record_pid(&name, id, pid);
        info!(
            "Service started: {name} on port {port} ({} {}, pid {})",
            program,
            descriptor.entrypoint_file(),
            pid.map(|p| p.to_string()).unwrap_or_else(|| "?".into()),
        );
        self.emit(Notifications::SERVICE_STARTED, json!({ "name": name, "port": port, "pid": pid }));

        let this = Arc::clone(self);
        let watcher_name = name.clone();
        let watcher = tokio::spawn(async move {
            let status = wait_or_stop(&mut child, &stop).await;
            this.on_exit(&watcher_name, id, port, status);
        });
        self.watchers.insert(name, watcher);
        Ok(())
    }

    fn on_exit(&self, name: &str, id: u64, port: u16, status: io::Result<ExitStatus>) {
        if self.registry.remove_launch(name, id).is_none() {
            return;
        }

        let code = match &status {
            Ok(status) => status.code(),
            Err(_) => None,
        };
        match (&status, code) {
            (_, Some(code)) => info!("\"{name}\" service exited with code {code}"),
            (Ok(status), None) => info!("\"{name}\" service terminated ({status})"),
            (Err(e), None) => warn!("\"{name}\" service lost: {e}"),
        }

        self.emit(Notifications::SERVICE_EXITED, json!({ "name": name, "port": port, "code": code }));
    }

    fn emit(&self, method: &str, params: Value) {
        if let Some(tx) = &self.notification_tx {
            let notification = RpcNotification::new(method, Some(params));
            if let Ok(json) = serde_json::to_string(&notification) {
                let _ = tx.send(json);
            }
        }
    }
}

/// Wait for the child to exit on its own, or kill it when asked to stop.
async fn wait_or_stop(child: &mut Child, stop: &Notify) -> io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        _ = stop.notified() => {
            if let Err(e) = child.start_kill() {
                debug!("Kill failed: {e}");
            }
            child.wait().await
        }
    }
}

/// Log each line a service writes, prefixed with its name.
async fn forward_lines<R: AsyncRead + Unpin>(name: String, stream: R, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!("[{name}] {line}");
        } else {
            info!("[{name}] {line}");
        }
    }
}

/// Immediate subdirectories of `root`, sorted.
async fn service_dirs(root: &Path) -> Result<Vec<PathBuf>, SupervisorError> {
    let read_dir_err = |source| SupervisorError::ReadDir {
        path: root.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(read_dir_err)?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
        let path = entry.path();
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
