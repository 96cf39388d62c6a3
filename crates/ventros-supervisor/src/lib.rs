//! VentrOS Supervisor
//!
//! Discovers service directories on disk, gives each one an ephemeral
//! loopback port, launches it under the interpreter its entrypoint calls
//! for, and keeps the live name → port registry that the gateway reads.
//!
//! Layout of a services root:
//!
//! ```text
//! services/
//!   echo/main.js      → node main.js <port>
//!   notes/main.py     → python main.py <port>
//!   clock/main.sh     → sh main.sh <port>
//! ```

pub mod error;
pub mod interpreter;
pub mod listing;
pub mod port;
pub mod registry;
pub mod supervisor;

pub use error::{PortError, SupervisorError};
pub use interpreter::{ENTRYPOINTS, Interpreter, ServiceDescriptor};
pub use listing::{list_apps, list_services};
pub use port::{LoopbackProbe, PortAllocator, PortProbe, PortRange};
pub use registry::{ProcessHandle, RegistryEntry, ServiceRegistry};
pub use supervisor::{ServiceSupervisor, SupervisorConfig};
