//! Session lifecycle tests against in-memory transports

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use neonterm::Notification;
use neonterm::config::ConnectionProfile;
use neonterm::error::SessionError;
use neonterm::session::SessionPhase;
use neonterm::ssh::ShellCommand;

use common::{ExecMode, Harness, fast_options, is_closed, is_health, profile, quiet_options};

const WINDOW: Duration = Duration::from_millis(300);

#[tokio::test]
async fn open_emits_ready_and_registers_active_session() {
    let mut h = Harness::new(quiet_options());

    h.facade.connect("tab-1", profile("alpha")).await.unwrap();

    let (ready, _) = h
        .wait_for(WINDOW, |n| matches!(n, Notification::Ready { .. }))
        .await
        .expect("ready");
    assert_eq!(ready.key(), "tab-1");

    let snapshot = h.facade.lookup("tab-1").unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Active);
    assert_eq!(snapshot.host, "alpha");
    assert_eq!(snapshot.cwd, ".");
    assert!(snapshot.file_ops);
    assert!(snapshot.shell_open);
    assert_eq!(h.host("alpha").auth_methods.lock().as_slice(), &["password"]);
}

#[tokio::test]
async fn duplicate_key_is_rejected_without_touching_existing_session() {
    let mut h = Harness::new(quiet_options());
    h.facade.connect("tab-1", profile("alpha")).await.unwrap();
    let before = h.facade.lookup("tab-1").unwrap();

    let result = h.facade.connect("tab-1", profile("beta")).await;
    assert!(matches!(result, Err(SessionError::DuplicateSession(ref k)) if k == "tab-1"));

    let after = h.facade.lookup("tab-1").unwrap();
    assert_eq!(after.host, before.host);
    assert_eq!(after.phase, before.phase);
    assert_eq!(h.host("beta").connects.load(Ordering::SeqCst), 0);

    let seen = h.drain_for(Duration::from_millis(100)).await;
    assert!(!seen.iter().any(|n| matches!(n, Notification::Error { .. })));
}

#[tokio::test]
async fn close_is_idempotent_and_emits_closed_once() {
    let mut h = Harness::new(quiet_options());
    h.facade.connect("tab-1", profile("alpha")).await.unwrap();

    assert!(h.facade.disconnect("tab-1"));
    assert!(!h.facade.disconnect("tab-1"));
    assert!(!h.facade.disconnect("never-opened"));
    assert!(h.facade.lookup("tab-1").is_none());

    let seen = h.drain_for(WINDOW).await;
    let closed = seen.iter().filter(|n| is_closed(n, "tab-1")).count();
    assert_eq!(closed, 1);
    assert_eq!(h.host("alpha").disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn poller_fires_immediately_then_on_interval() {
    let mut h = Harness::new(fast_options());
    h.facade.connect("tab-1", profile("alpha")).await.unwrap();

    let seen = h.drain_for(Duration::from_millis(150)).await;
    let snapshots: Vec<_> = seen
        .iter()
        .filter_map(|n| match n {
            Notification::HealthSnapshot { key, snapshot } if key == "tab-1" => Some(snapshot),
            _ => None,
        })
        .collect();
    assert!(snapshots.len() >= 2, "got {} snapshots", snapshots.len());
    assert_eq!(snapshots[0].cpu.as_deref(), Some("Load: 0.42"));
    assert_eq!(snapshots[0].disk.as_deref(), Some("10G/50G (20%)"));

    let stored = h.facade.lookup("tab-1").unwrap().health.unwrap();
    assert_eq!(stored.mem.as_deref(), Some("512/2048MB 25.0%"));
}

#[tokio::test]
async fn no_health_after_close_even_with_tick_in_flight() {
    let mut h = Harness::new(fast_options());
    let host = h.host("alpha");
    host.set_exec(ExecMode::Delayed(
        Duration::from_millis(40),
        "LOAD:1.00\n".to_string(),
    ));

    h.facade.connect("tab-1", profile("alpha")).await.unwrap();
    // First tick is now waiting on the delayed exec
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.facade.disconnect("tab-1");

    let seen = h.drain_for(WINDOW).await;
    let closed_at = seen.iter().position(|n| is_closed(n, "tab-1")).unwrap();
    assert!(!seen[closed_at..].iter().any(|n| is_health(n, "tab-1")));

    let execs = host.execs.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(host.execs.load(Ordering::SeqCst), execs, "poller kept running");
}

#[tokio::test]
async fn hung_exec_times_out_and_polling_continues() {
    let mut h = Harness::new(fast_options());
    let host = h.host("alpha");
    host.set_exec(ExecMode::Hang);

    h.facade.connect("tab-1", profile("alpha")).await.unwrap();
    let seen = h.drain_for(Duration::from_millis(250)).await;

    assert!(!seen.iter().any(|n| is_health(n, "tab-1")));
    assert!(host.execs.load(Ordering::SeqCst) >= 2);
    assert_eq!(h.facade.lookup("tab-1").unwrap().phase, SessionPhase::Active);
}

#[tokio::test]
async fn failed_exec_is_swallowed() {
    let mut h = Harness::new(fast_options());
    let host = h.host("alpha");
    host.set_exec(ExecMode::Fail);

    h.facade.connect("tab-1", profile("alpha")).await.unwrap();
    let seen = h.drain_for(Duration::from_millis(150)).await;

    assert!(!seen.iter().any(|n| is_health(n, "tab-1")));
    assert!(!seen.iter().any(|n| matches!(n, Notification::Error { .. })));
    assert!(host.execs.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn slow_session_does_not_delay_another() {
    let mut h = Harness::new(fast_options());
    h.host("slow").set_exec(ExecMode::Hang);

    h.facade.connect("a", profile("slow")).await.unwrap();
    h.facade.connect("b", profile("fast")).await.unwrap();

    let seen = h.drain_for(Duration::from_millis(150)).await;
    assert!(seen.iter().any(|n| is_health(n, "b")));
    assert!(!seen.iter().any(|n| is_health(n, "a")));

    h.facade.disconnect("b");
    assert!(h.facade.lookup("a").is_some());
}

#[tokio::test]
async fn unreadable_key_file_fails_before_dialing() {
    let mut h = Harness::new(quiet_options());
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("id_missing");
    let profile = ConnectionProfile::with_private_key("alpha", "tester", &missing, None);

    let result = h.facade.connect("tab-1", profile).await;
    assert!(matches!(result, Err(SessionError::CredentialLoad(_))));
    assert!(h.facade.lookup("tab-1").is_none());
    assert_eq!(h.host("alpha").connects.load(Ordering::SeqCst), 0);

    let (error, before) = h
        .wait_for(WINDOW, |n| matches!(n, Notification::Error { .. }))
        .await
        .expect("error notification");
    assert!(before.is_empty());
    match error {
        Notification::Error { key, message } => {
            assert_eq!(key, "tab-1");
            assert!(message.starts_with("Key Load Error"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }

    // The key is free again
    h.facade.connect("tab-1", common::profile("alpha")).await.unwrap();
}

#[tokio::test]
async fn transport_failure_reports_error_and_registers_nothing() {
    let mut h = Harness::new(quiet_options());
    *h.host("alpha").connect_error.lock() = Some("connection refused".to_string());

    let result = h.facade.connect("tab-1", profile("alpha")).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert!(h.facade.lookup("tab-1").is_none());

    let seen = h.drain_for(Duration::from_millis(100)).await;
    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Notification::Error { key, message } => {
            assert_eq!(key, "tab-1");
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn auth_failure_disconnects_and_reports() {
    let mut h = Harness::new(quiet_options());
    let host = h.host("alpha");
    *host.auth_error.lock() = Some("bad password".to_string());

    let result = h.facade.connect("tab-1", profile("alpha")).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert!(h.facade.lookup("tab-1").is_none());

    let seen = h.drain_for(Duration::from_millis(100)).await;
    assert!(seen.iter().any(|n| matches!(n, Notification::Error { .. })));
    assert!(!seen.iter().any(|n| matches!(n, Notification::Ready { .. })));
    assert_eq!(host.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shell_failure_reports_error_then_closed() {
    let mut h = Harness::new(quiet_options());
    *h.host("alpha").shell_error.lock() = Some("pty refused".to_string());

    let result = h.facade.connect("tab-1", profile("alpha")).await;
    assert!(matches!(result, Err(SessionError::ShellOpen(_))));
    assert!(h.facade.lookup("tab-1").is_none());

    let seen = h.drain_for(WINDOW).await;
    let kinds: Vec<&str> = seen
        .iter()
        .filter_map(|n| match n {
            Notification::Ready { .. } => Some("ready"),
            Notification::Error { .. } => Some("error"),
            Notification::Closed { .. } => Some("closed"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec!["ready", "error", "closed"]);
}

#[tokio::test]
async fn file_channel_failure_leaves_terminal_only_session() {
    let mut h = Harness::new(quiet_options());
    *h.host("alpha").files_error.lock() = Some("subsystem refused".to_string());

    h.facade.connect("tab-1", profile("alpha")).await.unwrap();
    let snapshot = h.facade.lookup("tab-1").unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Active);
    assert!(!snapshot.file_ops);
    assert!(snapshot.shell_open);

    let result = h.facade.navigate("tab-1", "/").await;
    assert!(matches!(result, Err(SessionError::FileChannelUnavailable(_))));

    let seen = h.drain_for(Duration::from_millis(100)).await;
    assert!(!seen.iter().any(|n| matches!(n, Notification::DirectoryListing { .. })));
    assert!(!seen.iter().any(|n| matches!(n, Notification::Error { .. })));
}

#[tokio::test]
async fn shell_output_is_forwarded_and_remote_close_tears_down() {
    let mut h = Harness::new(quiet_options());
    let host = h.host("alpha");
    h.facade.connect("tab-1", profile("alpha")).await.unwrap();

    host.shell_output(b"login: ");
    host.shell_output(b"$ ");
    host.close_shell();

    let (_, before) = h
        .wait_for(WINDOW, |n| is_closed(n, "tab-1"))
        .await
        .expect("closed");
    let output: Vec<u8> = before
        .iter()
        .filter_map(|n| match n {
            Notification::ShellOutput { data, .. } => Some(data.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(output, b"login: $ ");
    assert!(h.facade.lookup("tab-1").is_none());
}

#[tokio::test]
async fn shell_input_is_delivered_in_order() {
    let h = Harness::new(quiet_options());
    let host = h.host("alpha");
    h.facade.connect("tab-1", profile("alpha")).await.unwrap();

    assert!(h.facade.shell_input("tab-1", b"ls"));
    assert!(h.facade.shell_resize("tab-1", 120, 40));
    assert!(h.facade.shell_input("tab-1", b" -la\n"));
    assert!(!h.facade.shell_input("unknown", b"x"));

    assert_eq!(
        host.take_shell_input(),
        vec![
            ShellCommand::Data(b"ls".to_vec()),
            ShellCommand::WindowChange { cols: 120, rows: 40 },
            ShellCommand::Data(b" -la\n".to_vec()),
        ]
    );
}

#[tokio::test]
async fn reopened_key_ignores_stale_shell_events() {
    let mut h = Harness::new(quiet_options());
    h.facade.connect("tab-1", profile("first")).await.unwrap();
    let first = h.host("first");
    h.facade.disconnect("tab-1");

    h.facade.connect("tab-1", profile("second")).await.unwrap();
    h.drain_for(Duration::from_millis(50)).await;

    // The first incarnation's shell ending must not close the new one
    first.shell_output(b"stale");
    first.close_shell();

    let seen = h.drain_for(Duration::from_millis(100)).await;
    assert!(seen.is_empty(), "unexpected {:?}", seen);
    assert_eq!(h.facade.lookup("tab-1").unwrap().host, "second");
}

#[tokio::test]
async fn close_all_closes_every_session() {
    let mut h = Harness::new(quiet_options());
    h.facade.connect("a", profile("alpha")).await.unwrap();
    h.facade.connect("b", profile("beta")).await.unwrap();
    assert_eq!(h.facade.registry().keys(), vec!["a".to_string(), "b".to_string()]);

    assert_eq!(h.facade.shutdown(), 2);
    assert!(h.facade.registry().is_empty());

    let seen = h.drain_for(WINDOW).await;
    assert_eq!(seen.iter().filter(|n| is_closed(n, "a")).count(), 1);
    assert_eq!(seen.iter().filter(|n| is_closed(n, "b")).count(), 1);
}

#[tokio::test]
async fn dropping_the_last_handle_stops_session_tasks() {
    let h = Harness::new(fast_options());
    let host = h.host("alpha");
    h.facade.connect("tab-1", profile("alpha")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(host.execs.load(Ordering::SeqCst) >= 1);

    // No shutdown: the facade simply goes away with a live session
    drop(h);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let execs = host.execs.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(host.execs.load(Ordering::SeqCst), execs, "poller outlived its registry");
    assert!(host.take_shell_input().contains(&ShellCommand::Close));
}
