//! The `ventros://` address grammar.
//!
//! ```text
//! ventros://<host>[/segment...][?query]
//! ```
//!
//! The host decides the route: the reserved `launcher` host, `<name>.app`
//! for static bundles, `<name>.service` for supervised subprocesses, and
//! anything else for the built-in not-found pages.

use std::fmt;

use url::Url;

use crate::error::UrlError;

pub const SCHEME: &str = "ventros";
pub const LAUNCHER_HOST: &str = "launcher";
pub const APP_SUFFIX: &str = ".app";
pub const SERVICE_SUFFIX: &str = ".service";

/// Route family selected by the host component of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Launcher,
    /// `<name>.app`, carrying the app name.
    App(String),
    /// `<name>.service`, carrying the service name.
    Service(String),
    Other,
}

impl HostKind {
    /// Classify a host. First match wins; a bare suffix with an empty
    /// logical name is not an app or service.
    pub fn classify(host: &str) -> Self {
        if host == LAUNCHER_HOST {
            return Self::Launcher;
        }
        if let Some(name) = host.strip_suffix(APP_SUFFIX).filter(|n| !n.is_empty()) {
            return Self::App(name.to_string());
        }
        if let Some(name) = host.strip_suffix(SERVICE_SUFFIX).filter(|n| !n.is_empty()) {
            return Self::Service(name.to_string());
        }
        Self::Other
    }
}

/// A parsed `ventros://` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalUrl {
    /// Lower-cased host.
    pub host: String,
    /// Path segments after the host, dot segments resolved and
    /// percent-encoding kept. One leading and one trailing slash are removed
    /// before splitting.
    pub segments: Vec<String>,
    /// Query string without the `?`, if non-empty.
    pub query: Option<String>,
}

impl LogicalUrl {
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let url = Url::parse(input).map_err(|source| UrlError::Malformed {
            input: input.to_string(),
            source,
        })?;
        if url.scheme() != SCHEME {
            return Err(UrlError::WrongScheme(input.to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| UrlError::MissingHost(input.to_string()))?
            .to_ascii_lowercase();

        let path = url.path();
        let path = path.strip_prefix('/').unwrap_or(path);
        let path = path.strip_suffix('/').unwrap_or(path);
        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').map(str::to_string).collect()
        };

        Ok(Self {
            host,
            segments,
            query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    pub fn kind(&self) -> HostKind {
        HostKind::classify(&self.host)
    }

    /// Remaining path joined with `/`, order and separators preserved.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Segments safe to join onto a filesystem root: empty, `.` and `..`
    /// segments are dropped so the result stays under the root.
    pub fn file_segments(&self) -> Vec<&str> {
        self.segments
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .collect()
    }
}

impl fmt::Display for LogicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}", self.host)?;
        if !self.segments.is_empty() {
            write!(f, "/{}", self.path())?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// Logical address of an app bundle.
pub fn app_address(name: &str) -> String {
    format!("{SCHEME}://{name}{APP_SUFFIX}")
}

/// Logical address of a service.
pub fn service_address(name: &str) -> String {
    format!("{SCHEME}://{name}{SERVICE_SUFFIX}")
}
