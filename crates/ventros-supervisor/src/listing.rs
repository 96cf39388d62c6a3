//! Read-only listings of installed apps and services for the host shell.

use std::path::Path;

use ventros_protocol::{app_address, service_address};

use crate::interpreter::ServiceDescriptor;

/// `ventros://<name>.app` for every directory under `apps_dir` that has an
/// `index.html`, sorted by name. A missing directory lists nothing.
pub async fn list_apps(apps_dir: &Path) -> Vec<String> {
    let mut apps = Vec::new();
    for (name, path) in child_entries(apps_dir).await {
        let index = path.join("index.html");
        if tokio::fs::try_exists(&index).await.unwrap_or(false) {
            apps.push(app_address(&name));
        }
    }
    apps
}

/// `ventros://<name>.service` for every directory under `services_dir`
/// matching an entrypoint convention, sorted by name. This reflects what is
/// installed, not what is running.
pub async fn list_services(services_dir: &Path) -> Vec<String> {
    let mut services = Vec::new();
    for (_, path) in child_entries(services_dir).await {
        if let Some(descriptor) = ServiceDescriptor::discover(&path).await {
            services.push(service_address(&descriptor.name));
        }
    }
    services
}

async fn child_entries(dir: &Path) -> Vec<(String, std::path::PathBuf)> {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return Vec::new();
    };

    let mut children = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        children.push((entry.file_name().to_string_lossy().to_string(), entry.path()));
    }
    children.sort();
    children
}
