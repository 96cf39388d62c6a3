//! HostShell: answers the display surface's IPC calls.
//!
//! Everything here is read-only except `system/stop`, which only raises a
//! flag the host binary waits on; tearing the process tree down is the
//! binary's job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};
use tokio::sync::Notify;
use tracing::info;
use ventros_protocol::{HandlerResult, IpcError, Methods};
use ventros_supervisor::{ServiceRegistry, list_apps, list_services};
use ventros_transport::RequestHandler;

use crate::layout::HostLayout;

pub struct HostShell {
    layout: HostLayout,
    registry: Arc<ServiceRegistry>,
    stopping: AtomicBool,
    stop_requested: Notify,
}

impl HostShell {
    pub fn new(layout: HostLayout, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            layout,
            registry,
            stopping: AtomicBool::new(false),
            stop_requested: Notify::new(),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Resolves once a client has called `system/stop`.
    pub async fn stop_requested(&self) {
        self.stop_requested.notified().await
    }

    async fn dispatch(&self, method: &str) -> HandlerResult {
        match method {
            Methods::SYSTEM_LIST_APP => Ok(json!(list_apps(&self.layout.apps_dir()).await)),

            Methods::SYSTEM_LIST_SERVICE => Ok(json!(list_services(&self.layout.services_dir()).await)),

            Methods::SYSTEM_SERVICES => {
                let running: Vec<Value> = self.registry.snapshot().iter().map(|e| e.to_json()).collect();
                Ok(Value::Array(running))
            }

            Methods::SYSTEM_ENTRY => Ok(self.layout.entry_location().await.to_json()),

            Methods::SYSTEM_STOP => {
                if !self.stopping.swap(true, Ordering::SeqCst) {
                    info!("Stop requested over IPC");
                    self.stop_requested.notify_one();
                }
                Ok(json!({ "stopping": true }))
            }

            _ => Err(IpcError::method_not_found(method)),
        }
    }
}

impl RequestHandler for HostShell {
    async fn handle_request(&self, method: &str, _params: Option<Value>) -> HandlerResult {
        if self.is_stopping() && method != Methods::SYSTEM_STOP {
            return Err(IpcError::shutting_down());
        }
        self.dispatch(method).await
    }
}
