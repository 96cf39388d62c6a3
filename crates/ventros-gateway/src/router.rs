//! Gateway Router: turns a `ventros://` address into a [`RouteTarget`].
//!
//! Host classification, first match wins:
//!
//! | host            | route                                                |
//! |-----------------|------------------------------------------------------|
//! | `launcher`      | file under `<home>/launcher`, SPA fallback to its index |
//! | `<name>.app`    | file under `<home>/apps/<name>`, else not-found route |
//! | `<name>.service`| redirect to the live port, else JSON 404              |
//! | anything else   | file under `<root>/pages/not_found`                   |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use ventros_protocol::{HostKind, LogicalUrl, NotFoundKind, RouteTarget};
use ventros_supervisor::ServiceRegistry;
use ventros_transport::RouteResolver;

use crate::layout::{EntryLocation, HostLayout, is_file};

const INDEX: &str = "index.html";

pub struct GatewayRouter {
    layout: HostLayout,
    registry: Arc<ServiceRegistry>,
}

impl GatewayRouter {
    pub fn new(layout: HostLayout, registry: Arc<ServiceRegistry>) -> Self {
        Self { layout, registry }
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Early interception for `.service` hosts: the redirect URL when the
    /// service has a live port, otherwise `None` so the request reaches
    /// [`GatewayRouter::resolve`].
    pub fn rewrite_if_service(&self, url: &str) -> Option<String> {
        let url = LogicalUrl::parse(url).ok()?;
        self.service_redirect(&url)
    }

    /// Resolve any `ventros://` address. Never fails: every miss lands on a
    /// fallback page or the service JSON 404.
    pub async fn resolve(&self, url: &str) -> RouteTarget {
        let url = match LogicalUrl::parse(url) {
            Ok(url) => url,
            Err(e) => {
                debug!("{e}");
                return self.not_found_route(&[]).await;
            }
        };
        let segments = url.file_segments();

        match url.kind() {
            HostKind::Launcher => {
                let root = self.layout.launcher_dir();
                let path = resolve_with_fallback(&root, &segments, INDEX)
                    .await
                    .unwrap_or_else(|| root.join(INDEX));
                RouteTarget::StaticFile(path)
            }
            HostKind::App(name) => {
                let root = self.layout.app_dir(&name);
                match resolve_with_fallback(&root, &segments, INDEX).await {
                    Some(path) => RouteTarget::StaticFile(path),
                    None => self.not_found_route(&segments).await,
                }
            }
            HostKind::Service(_) => match self.service_redirect(&url) {
                Some(location) => RouteTarget::Redirect(location),
                None => RouteTarget::NotFound(NotFoundKind::ServiceNotExist),
            },
            HostKind::Other => self.not_found_route(&segments).await,
        }
    }

    /// Body for a hard not-found answer: the asset override if present,
    /// otherwise the built-in document.
    pub async fn not_found_payload(&self, kind: NotFoundKind) -> Vec<u8> {
        match tokio::fs::read(self.layout.payload_path(kind)).await {
            Ok(body) => body,
            Err(_) => kind.default_payload().to_string().into_bytes(),
        }
    }

    fn service_redirect(&self, url: &LogicalUrl) -> Option<String> {
        let HostKind::Service(name) = url.kind() else {
            return None;
        };
        let port = self.registry.port(&name)?;
        Some(redirect_url(port, url))
    }

    async fn not_found_route(&self, segments: &[&str]) -> RouteTarget {
        let root = self.layout.not_found_dir();
        let path = resolve_with_fallback(&root, segments, INDEX)
            .await
            .unwrap_or_else(|| root.join(INDEX));
        RouteTarget::StaticFile(path)
    }
}

impl RouteResolver for GatewayRouter {
    fn rewrite_if_service(&self, url: &str) -> Option<String> {
        GatewayRouter::rewrite_if_service(self, url)
    }

    async fn resolve(&self, url: &str) -> RouteTarget {
        GatewayRouter::resolve(self, url).await
    }

    async fn not_found_payload(&self, kind: NotFoundKind) -> Vec<u8> {
        GatewayRouter::not_found_payload(self, kind).await
    }

    async fn entry(&self) -> RouteTarget {
        match self.layout.entry_location().await {
            EntryLocation::Launcher => RouteTarget::Redirect("/launcher/".into()),
            EntryLocation::HomePage(path) | EntryLocation::Welcome(path) => RouteTarget::StaticFile(path),
        }
    }

    fn service_count(&self) -> usize {
        self.registry.len()
    }
}

/// `http://localhost:<port>/<path>[?query]` for a service address.
pub fn redirect_url(port: u16, url: &LogicalUrl) -> String {
    let mut location = format!("http://localhost:{port}/{}", url.path());
    if let Some(query) = &url.query {
        location.push('?');
        location.push_str(query);
    }
    location
}

/// Resolve `segments` under `root`.
///
/// A directory is retargeted to its `index.html`. When the (possibly
/// retargeted) path is not a file, `root/<fallback>` is used instead;
/// `None` when that is missing too.
pub async fn resolve_with_fallback(root: &Path, segments: &[&str], fallback: &str) -> Option<PathBuf> {
    let mut candidate = root.to_path_buf();
    candidate.extend(segments);

    if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_dir()) {
        candidate.push(INDEX);
    }
    if is_file(&candidate).await {
        return Some(candidate);
    }

    let fallback = root.join(fallback);
    is_file(&fallback).await.then_some(fallback)
}
