//! VentrOS Gateway: resolves `ventros://` requests and answers the host
//! shell's IPC calls.
//!
//! The router owns no mutable state: every decision is a function of the
//! request URL, a read of the service registry, and the filesystem.

pub mod layout;
pub mod router;
pub mod shell;

pub use layout::{EntryLocation, HostLayout};
pub use router::{GatewayRouter, redirect_url, resolve_with_fallback};
pub use shell::HostShell;
