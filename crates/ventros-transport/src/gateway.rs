//! Gateway endpoint: serves `ventros://` addresses over loopback HTTP.
//!
//! `http://<gateway>/<host>/<path>?<query>` is handled exactly like
//! `ventros://<host>/<path>?<query>`. Service redirects run first; only
//! requests they do not claim are resolved. A bare `/<host>` is first
//! redirected to `/<host>/` so relative asset URLs in the served page
//! resolve under the host.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info};
use ventros_protocol::{RouteTarget, SCHEME};

use crate::server::{AppState, RequestHandler, RouteResolver};

pub(crate) async fn gateway_handler<R: RouteResolver, H: RequestHandler>(
    State(state): State<Arc<AppState<R, H>>>,
    request: Request,
) -> Response {
    let url = logical_url(request.uri());

    if let Some(location) = state.resolver.rewrite_if_service(&url) {
        log_route(&state, &url, &location);
        return Redirect::temporary(&location).into_response();
    }

    if let Some(location) = bare_host_redirect(request.uri()) {
        log_route(&state, &url, &location);
        return Redirect::temporary(&location).into_response();
    }

    let target = state.resolver.resolve(&url).await;
    log_route(&state, &url, &format!("{target:?}"));
    respond(&state, target, request).await
}

pub(crate) async fn entry_handler<R: RouteResolver, H: RequestHandler>(
    State(state): State<Arc<AppState<R, H>>>,
    request: Request,
) -> Response {
    let target = state.resolver.entry().await;
    respond(&state, target, request).await
}

/// Rebuild the `ventros://` address a gateway request stands for.
pub fn logical_url(uri: &Uri) -> String {
    let path = uri.path().strip_prefix('/').unwrap_or(uri.path());
    match uri.query() {
        Some(query) => format!("{SCHEME}://{path}?{query}"),
        None => format!("{SCHEME}://{path}"),
    }
}

/// `/<host>` with nothing after the host gains a trailing slash.
pub fn bare_host_redirect(uri: &Uri) -> Option<String> {
    let host = uri.path().strip_prefix('/')?;
    if host.is_empty() || host.contains('/') {
        return None;
    }
    Some(match uri.query() {
        Some(query) => format!("/{host}/?{query}"),
        None => format!("/{host}/"),
    })
}

async fn respond<R: RouteResolver, H: RequestHandler>(
    state: &AppState<R, H>,
    target: RouteTarget,
    request: Request,
) -> Response {
    match target {
        RouteTarget::StaticFile(path) => match ServeFile::new(&path).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        RouteTarget::Redirect(location) => Redirect::temporary(&location).into_response(),
        RouteTarget::NotFound(kind) => {
            let body = state.resolver.not_found_payload(kind).await;
            let status = StatusCode::from_u16(kind.status()).unwrap_or(StatusCode::NOT_FOUND);
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
    }
}

fn log_route<R: RouteResolver, H: RequestHandler>(state: &AppState<R, H>, url: &str, outcome: &str) {
    if state.config.verbose_logging {
        info!("{url} -> {outcome}");
    } else {
        debug!("{url} -> {outcome}");
    }
}
