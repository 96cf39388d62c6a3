//! Supervisor tests: port allocation, discovery, registry bookkeeping,
//! listings, and real subprocess lifecycles.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use ventros_supervisor::*;

struct AlwaysFree;

impl PortProbe for AlwaysFree {
    async fn is_in_use(&self, _port: u16) -> bool {
        false
    }
}

#[derive(Clone, Default)]
struct AlwaysInUse {
    probes: Arc<AtomicUsize>,
}

impl PortProbe for AlwaysInUse {
    async fn is_in_use(&self, _port: u16) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        true
    }
}

fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn handle(id: u64) -> ProcessHandle {
    ProcessHandle::new(id, None, Arc::new(tokio::sync::Notify::new()))
}

/// Poll until `check` holds or the timeout elapses.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

// ─────────────────────────────────────────────────────────────────────────────
// Port allocator
// ─────────────────────────────────────────────────────────────────────────────

mod port {
    use super::*;

    #[tokio::test]
    async fn default_range_is_dynamic_private() {
        let range = PortRange::default();
        assert_eq!(range.start, 32768);
        assert_eq!(range.end, 60999);
    }

    #[tokio::test]
    async fn allocates_inside_range() {
        let allocator = PortAllocator::default();
        let port = allocator.allocate().await.unwrap();
        assert!(PortRange::default().contains(port), "port {port} out of range");
    }

    #[tokio::test]
    async fn free_single_port_is_returned() {
        let allocator = PortAllocator::with_probe(PortRange::single(40000), 10, AlwaysFree);
        assert_eq!(allocator.allocate().await.unwrap(), 40000);
    }

    #[tokio::test]
    async fn gives_up_after_ten_collisions() {
        let probe = AlwaysInUse::default();
        let allocator = PortAllocator::with_probe(PortRange::default(), 10, probe.clone());

        let err = allocator.allocate().await.unwrap_err();
        assert!(matches!(err, PortError::Exhausted { attempts: 10 }));
        assert_eq!(probe.probes.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn bound_port_is_reported_in_use() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(LoopbackProbe.is_in_use(port).await);
    }

    #[test]
    fn range_is_normalised() {
        let range = PortRange::new(50000, 40000);
        assert_eq!(range, PortRange { start: 40000, end: 50000 });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interpreter discovery
// ─────────────────────────────────────────────────────────────────────────────

mod discovery {
    use super::*;

    #[tokio::test]
    async fn node_wins_over_everything() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("echo");
        for file in ["main.bash", "main.sh", "main.py", "main.js"] {
            write_file(&dir.join(file), "");
        }

        let descriptor = ServiceDescriptor::discover(&dir).await.unwrap();
        assert_eq!(descriptor.name, "echo");
        assert_eq!(descriptor.interpreter, Interpreter::Node);
        assert_eq!(descriptor.entrypoint_path, dir.join("main.js"));
    }

    #[tokio::test]
    async fn priority_order_is_fixed() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("svc");
        write_file(&dir.join("main.sh"), "");
        write_file(&dir.join("main.py"), "");

        let descriptor = ServiceDescriptor::discover(&dir).await.unwrap();
        assert_eq!(descriptor.interpreter, Interpreter::Python);
        assert_eq!(descriptor.entrypoint_file(), "main.py");
    }

    #[tokio::test]
    async fn bash_is_last_resort() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("svc");
        write_file(&dir.join("main.bash"), "");

        let descriptor = ServiceDescriptor::discover(&dir).await.unwrap();
        assert_eq!(descriptor.interpreter, Interpreter::Bash);
        assert_eq!(descriptor.interpreter.program(), "bash");
    }

    #[tokio::test]
    async fn directory_without_entrypoint_is_not_a_service() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs");
        write_file(&dir.join("README.md"), "hello");
        write_file(&dir.join("main.rb"), "");

        assert!(ServiceDescriptor::discover(&dir).await.is_none());
    }

    #[test]
    fn entrypoint_table_matches_programs() {
        let programs: Vec<_> = ENTRYPOINTS.iter().map(|(file, i)| (*file, i.program())).collect();
        assert_eq!(
            programs,
            vec![("main.js", "node"), ("main.py", "python"), ("main.sh", "sh"), ("main.bash", "bash")]
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

mod registry {
    use super::*;

    #[tokio::test]
    async fn put_get_remove() {
        let registry = ServiceRegistry::new();
        registry.put(RegistryEntry::new("echo", 40000, Interpreter::Node, handle(1)));

        assert_eq!(registry.port("echo"), Some(40000));
        assert_eq!(registry.get("echo").unwrap().handle.id(), 1);
        assert!(registry.get("other").is_none());

        let removed = registry.remove("echo").unwrap();
        assert_eq!(removed.port, 40000);
        assert!(registry.is_empty());
        assert!(registry.remove("echo").is_none());
    }

    #[tokio::test]
    async fn launch_removal_happens_once() {
        let registry = ServiceRegistry::new();
        registry.put(RegistryEntry::new("echo", 40000, Interpreter::Shell, handle(7)));

        assert!(registry.remove_launch("echo", 8).is_none(), "other launch must not remove");
        assert!(registry.remove_launch("echo", 7).is_some());
        assert!(registry.remove_launch("echo", 7).is_none());
    }

    #[tokio::test]
    async fn pid_is_recorded_for_matching_launch_only() {
        let registry = ServiceRegistry::new();
        registry.put(RegistryEntry::new("echo", 40000, Interpreter::Shell, handle(3)));
        assert!(registry.get("echo").unwrap().handle.pid().is_none());

        assert!(!registry.record_pid("echo", 4, Some(999)));
        assert!(registry.get("echo").unwrap().handle.pid().is_none());

        assert!(registry.record_pid("echo", 3, Some(1234)));
        assert_eq!(registry.get("echo").unwrap().handle.pid(), Some(1234));

        registry.remove("echo");
        assert!(!registry.record_pid("echo", 3, Some(1234)));
    }

    #[tokio::test]
    async fn snapshot_is_sorted() {
        let registry = ServiceRegistry::new();
        registry.put(RegistryEntry::new("zeta", 40001, Interpreter::Shell, handle(1)));
        registry.put(RegistryEntry::new("alpha", 40002, Interpreter::Python, handle(2)));

        let names: Vec<_> = registry.snapshot().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn entry_json_shape() {
        let entry = RegistryEntry::new("echo", 40000, Interpreter::Bash, handle(1));
        let json = entry.to_json();
        assert_eq!(json["name"], "echo");
        assert_eq!(json["port"], 40000);
        assert_eq!(json["interpreter"], "bash");
        assert!(json["pid"].is_null());
        assert!(json["startedAt"].is_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listings
// ─────────────────────────────────────────────────────────────────────────────

mod listing {
    use super::*;

    #[tokio::test]
    async fn apps_need_index_html() {
        let tmp = TempDir::new().unwrap();
        let apps = tmp.path().join("apps");
        write_file(&apps.join("notes/index.html"), "<html></html>");
        write_file(&apps.join("calc/index.html"), "<html></html>");
        write_file(&apps.join("broken/app.js"), "");

        assert_eq!(
            list_apps(&apps).await,
            vec!["ventros://calc.app", "ventros://notes.app"]
        );
    }

    #[tokio::test]
    async fn services_need_entrypoint() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        write_file(&services.join("echo/main.js"), "");
        write_file(&services.join("clock/main.bash"), "");
        write_file(&services.join("docs/README.md"), "");

        assert_eq!(
            list_services(&services).await,
            vec!["ventros://clock.service", "ventros://echo.service"]
        );
    }

    #[tokio::test]
    async fn missing_directories_list_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(list_apps(&tmp.path().join("apps")).await.is_empty());
        assert!(list_services(&tmp.path().join("services")).await.is_empty());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor lifecycle (spawns real processes)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(unix)]
mod lifecycle {
    use super::*;
    use serde_json::Value;
    use tokio::sync::broadcast;

    fn supervisor_on<P: PortProbe>(
        services: &Path,
        range: PortRange,
        probe: P,
    ) -> (Arc<ServiceSupervisor<P>>, Arc<ServiceRegistry>) {
        let registry = Arc::new(ServiceRegistry::new());
        let mut config = SupervisorConfig::new(services);
        config.port_range = range;
        let supervisor = ServiceSupervisor::with_probe(config, registry.clone(), probe);
        (Arc::new(supervisor), registry)
    }

    #[tokio::test]
    async fn registers_service_under_directory_name() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        // Registered even if node is not installed: spawn failures keep the entry.
        write_file(&services.join("echo/main.js"), "setTimeout(() => {}, 30000);\n");

        let (supervisor, registry) = supervisor_on(&services, PortRange::single(40000), AlwaysFree);
        supervisor.start_all().await;

        assert_eq!(registry.port("echo"), Some(40000));
        assert_eq!(registry.len(), 1);

        supervisor.shutdown_all().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn passes_port_argument_and_working_directory() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        let dir = services.join("clock");
        write_file(&dir.join("main.sh"), "echo \"$1\" > port.txt\nsleep 30\n");

        let (supervisor, registry) = supervisor_on(&services, PortRange::single(41234), AlwaysFree);
        supervisor.start_all().await;

        let port_file = dir.join("port.txt");
        assert!(eventually(|| std::fs::read_to_string(&port_file).is_ok_and(|s| s.trim() == "41234")).await);
        assert!(registry.get("clock").unwrap().handle.pid().is_some());

        supervisor.shutdown_all().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn exit_removes_entry_exactly_once() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        write_file(&services.join("crash/main.sh"), "exit 3\n");

        let (tx, mut rx) = broadcast::channel(16);
        let registry = Arc::new(ServiceRegistry::new());
        let mut config = SupervisorConfig::new(&services);
        config.port_range = PortRange::single(42000);
        let mut supervisor = ServiceSupervisor::with_probe(config, registry.clone(), AlwaysFree);
        supervisor.set_notification_sender(tx);
        let supervisor = Arc::new(supervisor);

        supervisor.start_all().await;
        assert!(eventually(|| registry.is_empty()).await, "crashed service still registered");

        let mut exits = Vec::new();
        tokio::time::sleep(Duration::from_millis(200)).await;
        while let Ok(msg) = rx.try_recv() {
            let parsed: Value = serde_json::from_str(&msg).unwrap();
            if parsed["method"] == "service/exited" {
                exits.push(parsed["params"].clone());
            }
        }
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0]["name"], "crash");
        assert_eq!(exits[0]["code"], 3);
    }

    #[tokio::test]
    async fn entry_is_routable_before_child_runs() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        let dir = services.join("instant");
        write_file(&dir.join("main.sh"), "exit 0\n");

        let (tx, mut rx) = broadcast::channel(16);
        let registry = Arc::new(ServiceRegistry::new());
        let mut config = SupervisorConfig::new(&services);
        config.port_range = PortRange::single(42100);
        let mut supervisor = ServiceSupervisor::with_probe(config, registry.clone(), AlwaysFree);
        supervisor.set_notification_sender(tx);
        let supervisor = Arc::new(supervisor);

        assert_eq!(supervisor.launch(&dir).await.unwrap(), Some(42100));

        // Started is announced before the exit, and the exit removes the entry.
        let mut methods = Vec::new();
        while methods.len() < 2 {
            let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
            let parsed: Value = serde_json::from_str(&msg).unwrap();
            methods.push(parsed["method"].as_str().unwrap().to_string());
        }
        assert_eq!(methods, vec!["service/started", "service/exited"]);
        assert!(eventually(|| registry.is_empty()).await);
    }

    #[tokio::test]
    async fn port_exhaustion_skips_spawn() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        let dir = services.join("busy");
        write_file(&dir.join("main.sh"), "touch spawned\nsleep 30\n");

        let probe = AlwaysInUse::default();
        let (supervisor, registry) = supervisor_on(&services, PortRange::default(), probe.clone());
        assert_eq!(supervisor.start_all().await, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.is_empty());
        assert!(!dir.join("spawned").exists());
        assert_eq!(probe.probes.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn non_service_directories_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        write_file(&services.join("docs/README.md"), "");
        write_file(&services.join("stray-file.txt"), "");

        let (supervisor, registry) = supervisor_on(&services, PortRange::default(), AlwaysFree);
        assert_eq!(supervisor.start_all().await, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn missing_services_root_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let (supervisor, registry) =
            supervisor_on(&tmp.path().join("nope"), PortRange::default(), AlwaysFree);
        assert_eq!(supervisor.start_all().await, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn second_start_does_not_duplicate() {
        let tmp = TempDir::new().unwrap();
        let services = tmp.path().join("services");
        write_file(&services.join("idle/main.sh"), "sleep 30\n");

        let (supervisor, registry) = supervisor_on(&services, PortRange::single(43000), AlwaysFree);
        assert_eq!(supervisor.start_all().await, 1);
        let first = registry.get("idle").unwrap().handle.id();

        assert_eq!(supervisor.start_all().await, 0);
        assert_eq!(registry.get("idle").unwrap().handle.id(), first);

        supervisor.shutdown_all().await;
    }
}
