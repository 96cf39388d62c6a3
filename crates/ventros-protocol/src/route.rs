//! Outcome of a gateway routing decision.

use std::path::PathBuf;

use serde_json::json;

/// Where a `ventros://` request ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Serve this file. Always a file path, never a directory.
    StaticFile(PathBuf),
    /// Send the client to this absolute URL (a live service).
    Redirect(String),
    /// Answer with an error status and a fixed payload.
    NotFound(NotFoundKind),
}

/// The kinds of hard not-found answers. Everything else falls back to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// A `.service` host with no live registry entry.
    ServiceNotExist,
}

impl NotFoundKind {
    /// HTTP status code to answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::ServiceNotExist => 404,
        }
    }

    /// Stem of the payload file under the asset `pages/` directory.
    pub fn payload_stem(&self) -> &'static str {
        match self {
            Self::ServiceNotExist => "service_not_exist",
        }
    }

    /// Payload used when the asset directory has no override.
    pub fn default_payload(&self) -> serde_json::Value {
        match self {
            Self::ServiceNotExist => json!({
                "error": self.payload_stem(),
                "message": "The requested service is not running",
            }),
        }
    }
}
