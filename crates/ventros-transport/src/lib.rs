//! VentrOS Transport Layer
//!
//! One loopback HTTP server carries both faces of the host:
//! - the gateway: `/<host>/<path>` is served as `ventros://<host>/<path>`
//! - the IPC socket: `/ipc` speaks JSON-RPC 2.0 over WebSocket and relays
//!   service notifications to every connected client
//!
//! The transport is decoupled from routing and IPC logic via the
//! `RouteResolver` and `RequestHandler` traits.

pub mod gateway;
pub mod ipc;
pub mod server;

pub use server::{RequestHandler, RouteResolver, TransportConfig, TransportError, TransportServer};
