//! Host directory layout.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use ventros_protocol::NotFoundKind;
use ventros_protocol::scheme::{LAUNCHER_HOST, SCHEME};

const INDEX: &str = "index.html";

/// Where the host finds its built-in pages and the user's apps and services.
///
/// ```text
/// <root>/pages/not_found/        built-in not-found SPA
/// <root>/pages/welcome/          shown when nothing is installed
/// <root>/pages/<kind>.json       hard not-found payloads
/// <home>/launcher/index.html     home screen (optional)
/// <home>/apps/<name>/index.html
/// <home>/services/<name>/main.*
/// ```
#[derive(Debug, Clone)]
pub struct HostLayout {
    pub root: PathBuf,
    pub home: PathBuf,
}

impl HostLayout {
    pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            home: home.into(),
        }
    }

    pub fn launcher_dir(&self) -> PathBuf {
        self.home.join("launcher")
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.home.join("apps")
    }

    pub fn app_dir(&self, name: &str) -> PathBuf {
        self.apps_dir().join(name)
    }

    pub fn services_dir(&self) -> PathBuf {
        self.home.join("services")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    pub fn not_found_dir(&self) -> PathBuf {
        self.pages_dir().join("not_found")
    }

    pub fn welcome_page(&self) -> PathBuf {
        self.pages_dir().join("welcome").join(INDEX)
    }

    pub fn payload_path(&self, kind: NotFoundKind) -> PathBuf {
        self.pages_dir().join(format!("{}.json", kind.payload_stem()))
    }

    /// Pick the first page the display surface should show.
    pub async fn entry_location(&self) -> EntryLocation {
        let launcher = self.launcher_dir();
        if is_dir(&launcher).await && is_file(&launcher.join(INDEX)).await {
            return EntryLocation::Launcher;
        }

        let home_index = self.home.join(INDEX);
        if is_file(&home_index).await {
            return EntryLocation::HomePage(home_index);
        }

        EntryLocation::Welcome(self.welcome_page())
    }
}

/// First page to load at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLocation {
    /// `ventros://launcher`
    Launcher,
    /// A bare `index.html` at the top of the home directory.
    HomePage(PathBuf),
    /// Built-in welcome page; nothing is installed.
    Welcome(PathBuf),
}

impl EntryLocation {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Launcher => json!({ "kind": "launcher", "url": format!("{SCHEME}://{LAUNCHER_HOST}") }),
            Self::HomePage(path) => json!({ "kind": "home", "path": path.to_string_lossy() }),
            Self::Welcome(path) => json!({ "kind": "welcome", "path": path.to_string_lossy() }),
        }
    }
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

pub(crate) async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}
