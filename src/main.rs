//! VentrOS: local application host
//!
//! Launches every service under `<home>/services` on its own loopback port
//! and serves apps, the launcher, and services behind one `ventros://`
//! namespace through the gateway.
//!
//! Usage:
//!   ventros                                 # Root = cwd, home = ./home, port 7341
//!   ventros --root /opt/ventros             # Built-in pages under /opt/ventros/pages
//!   ventros --home ~/ventros --port 0       # Custom home, OS-assigned port
//!   ventros --system                        # system/stop powers the machine off
//!   ventros --exit-on-stdin-eof             # Exit with the parent that pipes our stdin

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use ventros_gateway::{EntryLocation, GatewayRouter, HostLayout, HostShell};
use ventros_supervisor::{ServiceRegistry, ServiceSupervisor, SupervisorConfig};
use ventros_transport::{TransportConfig, TransportServer};

#[derive(Parser, Debug)]
#[command(name = "ventros", about = "VentrOS: local application host")]
struct Cli {
    /// Asset root holding the built-in `pages/` directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Home directory holding `apps/`, `services/` and `launcher/` (defaults to <root>/home)
    #[arg(long)]
    home: Option<PathBuf>,

    /// Gateway port (0 for OS-assigned)
    #[arg(long, default_value = "7341")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Maximum concurrent IPC connections
    #[arg(long, default_value = "32")]
    max_connections: usize,

    /// Run as the system shell: `system/stop` also powers the machine off
    #[arg(long)]
    system: bool,

    /// Shut down when stdin reaches EOF (for a parent that holds our stdin open)
    #[arg(long)]
    exit_on_stdin_eof: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to <home>/logs/ventros.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

/// Why the host is going down.
enum Shutdown {
    Signal,
    StdinClosed,
    Requested,
}

fn init_tracing(cli: &Cli, home: &std::path::Path) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let Some(ref log_file_arg) = cli.log_file else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(());
    };

    let log_path = if log_file_arg == "DEFAULT" {
        home.join("logs/ventros.log")
    } else {
        PathBuf::from(log_file_arg)
    };
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    eprintln!("Logging to {}", log_path.display());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let root = cli.root.canonicalize().unwrap_or_else(|_| cli.root.clone());
    let home = cli.home.clone().unwrap_or_else(|| root.join("home"));

    if let Err(e) = init_tracing(&cli, &home) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli, HostLayout::new(root, home)).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, layout: HostLayout) -> anyhow::Result<()> {
    // Shared notification channel: supervisor events → IPC clients
    let (notification_tx, _) = broadcast::channel::<String>(1024);

    let registry = Arc::new(ServiceRegistry::new());

    let mut supervisor = ServiceSupervisor::new(SupervisorConfig::new(layout.services_dir()), registry.clone());
    supervisor.set_notification_sender(notification_tx.clone());
    let supervisor = Arc::new(supervisor);

    let router = Arc::new(GatewayRouter::new(layout.clone(), registry.clone()));
    let shell = Arc::new(HostShell::new(layout.clone(), registry.clone()));

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_connections: Some(cli.max_connections),
        verbose_logging: cli.verbose,
    };
    let mut transport = TransportServer::start_with_sender(transport_config, router, shell.clone(), notification_tx)
        .await
        .context("Failed to start gateway")?;

    let launched = supervisor.start_all().await;
    let gateway_url = format!("http://{}:{}", cli.hostname, transport.port());
    let entry = layout.entry_location().await;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                          VentrOS                             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Root:       {}", layout.root.display());
    println!("  Home:       {}", layout.home.display());
    println!("  Services:   {launched} running");
    match &entry {
        EntryLocation::Launcher => println!("  Entry:      ventros://launcher"),
        EntryLocation::HomePage(path) => println!("  Entry:      {}", path.display()),
        EntryLocation::Welcome(path) => println!("  Entry:      {} (welcome)", path.display()),
    }
    if cli.system {
        println!("  Mode:       system shell (stop powers off)");
    }
    println!();
    println!("  Gateway:    {gateway_url}/");
    println!("  IPC:        ws://{}:{}/ipc", cli.hostname, transport.port());
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    // Stdin EOF means the display surface that spawned us is gone. Without
    // the flag nothing ever notifies, so `/dev/null` stdin is harmless.
    let stdin_closed = Arc::new(tokio::sync::Notify::new());
    if cli.exit_on_stdin_eof {
        let notify = stdin_closed.clone();
        std::thread::spawn(move || {
            use std::io::Read;
            let mut buf = [0u8; 1];
            loop {
                match std::io::stdin().read(&mut buf) {
                    Ok(0) | Err(_) => {
                        notify.notify_one();
                        return;
                    }
                    Ok(_) => continue,
                }
            }
        });
    }

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => Shutdown::Signal,
        _ = stdin_closed.notified() => Shutdown::StdinClosed,
        _ = shell.stop_requested() => Shutdown::Requested,
    };
    match reason {
        Shutdown::Signal => info!("Interrupted, shutting down"),
        Shutdown::StdinClosed => info!("stdin closed (parent process gone), shutting down"),
        Shutdown::Requested => info!("Stop requested, shutting down"),
    }

    println!();
    println!("  Shutting down...");
    transport.stop().await;
    supervisor.shutdown_all().await;

    if cli.system && matches!(reason, Shutdown::Requested) {
        info!("Powering off");
        match tokio::process::Command::new("shutdown").arg("now").status().await {
            Ok(status) if !status.success() => warn!("shutdown exited with {status}"),
            Ok(_) => {}
            Err(e) => warn!("Failed to run shutdown: {e}"),
        }
    }

    println!("  Host stopped.");
    Ok(())
}
