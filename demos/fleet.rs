//! # Example: Fleet dashboard
//!
//! Launches a cluster from a server directory and prints a status table
//! whenever the registry changes (and every 5s regardless), until Ctrl-C.
//!
//! ```text
//! cargo run --example fleet -- /srv/eqemu bin 4 queryserv loginserver
//! ```
//!
//! Arguments: server dir, binary dir (relative to the server dir or absolute),
//! zone count, then any extra executables. The trace goes to `overseer.log`.

use std::time::Duration;

use overseer::{Config, FleetSpec, LogConfig, Overseer, Snapshot};

const POLL: Duration = Duration::from_secs(5);

fn render(snap: &Snapshot) {
    println!("{:<16} {:<12} {:>8} {:>8}", "NAME", "STATE", "PID", "UPTIME");
    for p in snap.others() {
        println!(
            "{:<16} {:<12} {:>8} {:>8}",
            p.name,
            p.state,
            p.pid,
            p.uptime_label()
        );
    }

    let z = &snap.zones;
    println!(
        "zones: {} total, {} starting, {} running, {} sleeping, {} erroring, {} restarting, {} stopped",
        z.total, z.starting, z.running, z.sleeping, z.erroring, z.restarting, z.stopped
    );
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let server_dir = args.next().unwrap_or_else(|| ".".into());
    let bin_dir = args.next().unwrap_or_else(|| "bin".into());
    let zones: usize = args.next().map(|n| n.parse()).transpose()?.unwrap_or(2);
    let apps: Vec<String> = args.collect();

    overseer::logging::init(&LogConfig::at("overseer.log"))?;

    let mut cfg = Config::default();
    cfg.grace = Some(Duration::from_secs(60));
    let overseer = Overseer::new(cfg);

    let fleet = FleetSpec::new(server_dir, bin_dir)
        .with_zone_count(zones)
        .with_apps(apps);
    overseer.launch_fleet(&fleet)?;

    // Redraw on change, with a periodic fallback for coalesced notifications.
    let registry = overseer.registry();
    let shutdown = overseer.shutdown_handle();
    let dashboard = tokio::spawn(async move {
        let mut changes = registry.subscribe();
        loop {
            render(&registry.snapshot().await);
            tokio::select! {
                _ = shutdown.requested() => break,
                change = changes.recv() => {
                    if change.is_none() {
                        break;
                    }
                    while changes.try_recv().is_ok() {}
                }
                _ = tokio::time::sleep(POLL) => {}
            }
        }
    });

    println!("press Ctrl-C to stop the cluster");
    let res = overseer.run_until_signal().await;
    let _ = dashboard.await;

    render(&overseer.registry().snapshot().await);
    res?;
    Ok(())
}
