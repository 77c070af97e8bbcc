//! Facade integration tests against a stub launcher.
//!
//! A shell script stands in for the engine launcher: it records every argv
//! it receives and replays canned behavior for /listpids and /wait, so the
//! full create/start/query/destroy cycle can run without a Sandboxie
//! installation. Unix-only because the stub is a shell script.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Instant;

use sandboxie::{Error, Sandboxie, SandboxieConfig, StartOptions};
use tempfile::TempDir;

const STUB_LAUNCHER: &str = r#"#!/bin/sh
# Records argv, then mimics the engine launcher.
dir=$(dirname "$0")
echo "$@" >> "$dir/invocations.log"
wait_requested=no
for arg in "$@"; do
    case "$arg" in
        /wait) wait_requested=yes ;;
        /listpids) printf '13\n2705\n1336\n' ; exit 0 ;;
        /box:BROKEN) echo 'no such sandbox' >&2 ; exit 2 ;;
    esac
done
if [ "$wait_requested" = yes ]; then
    sleep 0.3
    exit 7
fi
exit 0
"#;

struct Fixture {
    dir: TempDir,
    sbie: Sandboxie,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ini_path = dir.path().join("Sandboxie.ini");
        std::fs::write(&ini_path, "[DefaultBox]\nEnabled=yes\n").unwrap();

        let launcher_path = dir.path().join("start.sh");
        std::fs::write(&launcher_path, STUB_LAUNCHER).unwrap();
        let mut perms = std::fs::metadata(&launcher_path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&launcher_path, perms).unwrap();

        let config = SandboxieConfig {
            install_dir: dir.path().to_path_buf(),
            default_box: "DefaultBox".to_string(),
            config_path: Some(ini_path),
            launcher_path: Some(launcher_path),
        };
        let sbie = Sandboxie::new(config).unwrap();
        Self { dir, sbie }
    }

    fn logged_invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("invocations.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn ini_path(&self) -> PathBuf {
        self.sbie.store().path().to_path_buf()
    }
}

#[tokio::test]
async fn create_then_read_round_trips_options() {
    let fx = Fixture::new();
    fx.sbie
        .create_sandbox("foo", [("Enabled", "yes"), ("AutoDelete", "no")])
        .await
        .unwrap();

    let options = fx.sbie.read_sandbox_options("foo").await.unwrap();
    assert_eq!(options.get("Enabled").unwrap(), "yes");
    assert_eq!(options.get("AutoDelete").unwrap(), "no");
    assert_eq!(options.len(), 2);

    // Creation must have asked the engine to reload its config.
    assert!(fx
        .logged_invocations()
        .iter()
        .any(|line| line.contains("/reload")));
}

#[tokio::test]
async fn list_sandboxes_contains_each_created_box_once() {
    let fx = Fixture::new();
    fx.sbie.create_sandbox("A", [("Enabled", "yes")]).await.unwrap();
    fx.sbie.create_sandbox("B", [("Enabled", "yes")]).await.unwrap();

    let boxes = fx.sbie.list_sandboxes().await.unwrap();
    assert_eq!(boxes.iter().filter(|b| *b == "A").count(), 1);
    assert_eq!(boxes.iter().filter(|b| *b == "B").count(), 1);
}

#[tokio::test]
async fn destroy_missing_sandbox_is_not_found() {
    let fx = Fixture::new();
    let err = fx.sbie.destroy_sandbox("absent").await.unwrap_err();
    assert!(matches!(err, Error::SandboxNotFound(name) if name == "absent"));
}

#[tokio::test]
async fn destroy_removes_only_the_named_box() {
    let fx = Fixture::new();
    fx.sbie.create_sandbox("doomed", [("Enabled", "yes")]).await.unwrap();
    fx.sbie.destroy_sandbox("doomed").await.unwrap();

    let boxes = fx.sbie.list_sandboxes().await.unwrap();
    assert!(!boxes.contains(&"doomed".to_string()));
    assert!(boxes.contains(&"DefaultBox".to_string()));
}

#[tokio::test]
async fn start_with_wait_blocks_until_exit_and_returns_exit_code() {
    let fx = Fixture::new();
    let begun = Instant::now();

    let outcome = fx
        .sbie
        .start("some_tool.exe", &StartOptions::new().with_wait(true))
        .await
        .unwrap();

    // The stub sleeps 300ms before exiting 7 when /wait is passed.
    assert!(begun.elapsed().as_millis() >= 300);
    assert_eq!(outcome.exit_code, 7);
}

#[tokio::test]
async fn start_without_wait_returns_once_launch_is_issued() {
    let fx = Fixture::new();
    let outcome = fx
        .sbie
        .start("some_tool.exe", &StartOptions::new())
        .await
        .unwrap();
    assert_eq!(outcome.exit_code, 0);

    let last = fx.logged_invocations().pop().unwrap();
    assert!(!last.contains("/wait"));
}

#[tokio::test]
async fn start_in_broken_box_surfaces_launcher_failure() {
    let fx = Fixture::new();
    let err = fx
        .sbie
        .start("some_tool.exe", &StartOptions::new().in_box("BROKEN"))
        .await
        .unwrap_err();

    match err {
        Error::ExternalTool { status, stderr, .. } => {
            assert_eq!(status, Some(2));
            assert!(stderr.contains("no such sandbox"));
        }
        other => panic!("expected ExternalTool, got {other:?}"),
    }
}

#[tokio::test]
async fn running_processes_parses_stub_pid_listing() {
    let fx = Fixture::new();
    let pids = fx.sbie.running_processes(None).await.unwrap();
    assert_eq!(pids, vec![13, 2705, 1336]);
}

#[tokio::test]
async fn delete_contents_leaves_config_section_intact() {
    let fx = Fixture::new();
    fx.sbie.create_sandbox("foo", [("Enabled", "yes")]).await.unwrap();
    let before = std::fs::read_to_string(fx.ini_path()).unwrap();

    fx.sbie.delete_contents(Some("foo")).await.unwrap();

    let after = std::fs::read_to_string(fx.ini_path()).unwrap();
    assert_eq!(before, after);

    let last = fx.logged_invocations().pop().unwrap();
    assert!(last.contains("/box:foo"));
    assert!(last.contains("delete_sandbox_silent"));
}

#[tokio::test]
async fn terminate_targets_the_requested_box() {
    let fx = Fixture::new();
    fx.sbie.terminate_processes(Some("foo")).await.unwrap();

    let last = fx.logged_invocations().pop().unwrap();
    assert!(last.contains("/box:foo"));
    assert!(last.contains("/terminate"));
}
