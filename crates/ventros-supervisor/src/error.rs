//! Supervisor error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("no free port after {attempts} attempts")]
    Exhausted { attempts: usize },
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to read services directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("service \"{name}\" not started: {source}")]
    Port {
        name: String,
        #[source]
        source: PortError,
    },

    #[error("failed to spawn \"{name}\" with {program}: {source}")]
    Spawn {
        name: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
}
