//! End-to-end supervision of real `/bin/sh` children.
#![cfg(unix)]

use std::time::Duration;

use overseer::{
    AppState, BackoffPolicy, Change, ChangeKind, Config, Overseer, ProcessKind, ProcessSpec,
};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

fn sh(name: &str, dir: &std::path::Path, script: &str) -> ProcessSpec {
    ProcessSpec::new(name, dir, "/bin/sh").with_args(["-c", script])
}

fn quick_config() -> Config {
    Config {
        backoff: BackoffPolicy {
            step: Duration::from_millis(100),
            max: Duration::from_millis(500),
            floor: Duration::from_millis(100),
            stable_after: Duration::from_secs(180),
        },
        stop_grace: Duration::from_secs(2),
        ..Config::default()
    }
}

async fn wait_for(changes: &mut mpsc::Receiver<Change>, name: &str, want: AppState) {
    tokio::time::timeout(WAIT, async {
        loop {
            let change = changes.recv().await.expect("registry dropped");
            if &*change.name == name && change.kind == ChangeKind::State(want) {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{name} never reached {want}"));
}

#[tokio::test]
async fn test_world_banner_then_graceful_stop() {
    let dir = tempfile::tempdir().unwrap();
    let overseer = Overseer::new(quick_config());
    let registry = overseer.registry();
    let mut changes = registry.subscribe();

    let spec = sh(
        "world",
        dir.path(),
        "trap 'exit 0' INT; echo 'Starting EQ Network server on 0.0.0.0:9000'; while :; do sleep 0.1; done",
    )
    .with_kind(ProcessKind::World);
    overseer.manage(spec).unwrap();

    wait_for(&mut changes, "world", AppState::Starting).await;
    wait_for(&mut changes, "world", AppState::Running).await;
    assert_ne!(registry.pid("world").await, Some(0));

    tokio::time::timeout(WAIT, overseer.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();

    assert_eq!(overseer.active(), 0);
    assert_eq!(registry.state("world").await, Some(AppState::Stopped));
    assert_eq!(registry.pid("world").await, Some(0));
}

#[tokio::test]
async fn test_crashing_child_is_respawned() {
    let dir = tempfile::tempdir().unwrap();
    let overseer = Overseer::new(quick_config());
    let mut changes = overseer.registry().subscribe();

    overseer.manage(sh("crasher", dir.path(), "exit 1")).unwrap();

    wait_for(&mut changes, "crasher", AppState::Starting).await;
    wait_for(&mut changes, "crasher", AppState::Restarting).await;
    wait_for(&mut changes, "crasher", AppState::Starting).await;
    wait_for(&mut changes, "crasher", AppState::Restarting).await;

    tokio::time::timeout(WAIT, overseer.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
    assert_eq!(
        overseer.registry().state("crasher").await,
        Some(AppState::Stopped)
    );
}

#[tokio::test]
async fn test_error_line_while_starting() {
    let dir = tempfile::tempdir().unwrap();
    let overseer = Overseer::new(quick_config());
    let mut changes = overseer.registry().subscribe();

    overseer
        .manage(sh(
            "qs",
            dir.path(),
            "trap 'exit 0' INT; echo '[Error] database unreachable'; while :; do sleep 0.1; done",
        ))
        .unwrap();

    wait_for(&mut changes, "qs", AppState::Erroring).await;

    tokio::time::timeout(WAIT, overseer.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
}

#[tokio::test]
async fn test_child_ignoring_interrupt_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = quick_config();
    cfg.stop_grace = Duration::from_millis(300);
    let overseer = Overseer::new(cfg);
    let mut changes = overseer.registry().subscribe();

    overseer
        .manage(
            sh(
                "zone0",
                dir.path(),
                "trap '' INT; echo 'Entering sleep mode'; while :; do sleep 0.1; done",
            )
            .with_kind(ProcessKind::Zone),
        )
        .unwrap();

    wait_for(&mut changes, "zone0", AppState::Sleeping).await;

    tokio::time::timeout(WAIT, overseer.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
    assert_eq!(overseer.active(), 0);
}

#[tokio::test]
async fn test_invalid_working_dir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let overseer = Overseer::new(Config::default());

    let err = overseer
        .manage(sh("world", &dir.path().join("missing"), "true"))
        .unwrap_err();
    assert_eq!(err.as_label(), "runtime_spawn");
    assert_eq!(overseer.active(), 0);
}
