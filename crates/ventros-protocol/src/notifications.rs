//! Notification names pushed to every connected IPC client.

pub struct Notifications;

impl Notifications {
    // ── Server lifecycle ────────────────────────────────────────────────
    pub const SERVER_CONNECTED: &str = "server/connected";

    // ── Services ────────────────────────────────────────────────────────
    pub const SERVICE_STARTED: &str = "service/started";
    pub const SERVICE_EXITED: &str = "service/exited";
}
