//! Interpreter selection by entrypoint file convention.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// How a service's entrypoint is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    Node,
    Python,
    Shell,
    Bash,
}

/// Entrypoint conventions in priority order. The first file present wins.
pub const ENTRYPOINTS: [(&str, Interpreter); 4] = [
    ("main.js", Interpreter::Node),
    ("main.py", Interpreter::Python),
    ("main.sh", Interpreter::Shell),
    ("main.bash", Interpreter::Bash),
];

impl Interpreter {
    /// Program looked up on `PATH` to run the entrypoint.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Python => "python",
            Self::Shell => "sh",
            Self::Bash => "bash",
        }
    }

    pub fn entrypoint(&self) -> &'static str {
        ENTRYPOINTS
            .iter()
            .find(|(_, interpreter)| interpreter == self)
            .map(|(file, _)| *file)
            .unwrap_or_default()
    }
}

/// A directory that qualifies as a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Directory base name; the `<name>` in `<name>.service`.
    pub name: String,
    pub dir: PathBuf,
    pub entrypoint_path: PathBuf,
    pub interpreter: Interpreter,
}

impl ServiceDescriptor {
    /// Inspect `dir` for an entrypoint. `None` means the directory is not a
    /// service, which is not an error.
    pub async fn discover(dir: &Path) -> Option<Self> {
        let name = dir.file_name()?.to_string_lossy().to_string();

        for (file, interpreter) in ENTRYPOINTS {
            let entrypoint_path = dir.join(file);
            if is_file(&entrypoint_path).await {
                return Some(Self {
                    name,
                    dir: dir.to_path_buf(),
                    entrypoint_path,
                    interpreter,
                });
            }
        }

        None
    }

    /// Entrypoint file name, passed relative to the service directory.
    pub fn entrypoint_file(&self) -> &str {
        self.interpreter.entrypoint()
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
