//! Host shell IPC method names.
//!
//! Each constant is the exact string sent over the wire as the `method`
//! field of a JSON-RPC request on the `/ipc` socket.

/// All IPC method names.
pub struct Methods;

impl Methods {
    // ── System ──────────────────────────────────────────────────────────
    pub const SYSTEM_LIST_APP: &str = "system/list/app";
    pub const SYSTEM_LIST_SERVICE: &str = "system/list/service";
    pub const SYSTEM_SERVICES: &str = "system/services";
    pub const SYSTEM_ENTRY: &str = "system/entry";
    pub const SYSTEM_STOP: &str = "system/stop";
}
