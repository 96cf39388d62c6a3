//! VentrOS Protocol: wire types shared by every crate in the host.
//!
//! This crate is the single source of truth for the `ventros://` address
//! grammar, the outcome of a gateway routing decision, and the JSON-RPC 2.0
//! envelope, method names, notification names, and error codes used on the
//! host shell IPC channel.

pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod notifications;
pub mod route;
pub mod scheme;

pub use error::{IpcError, IpcErrorCode, UrlError};
pub use jsonrpc::{
    HandlerResult, RequestId, RpcErrorResponse, RpcNotification, RpcRequest, RpcResponse,
    RpcSuccessResponse,
};
pub use methods::Methods;
pub use notifications::Notifications;
pub use route::{NotFoundKind, RouteTarget};
pub use scheme::{HostKind, LogicalUrl, SCHEME, app_address, service_address};
