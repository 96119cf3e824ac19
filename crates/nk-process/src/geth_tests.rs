use super::*;
use std::fs;
use std::net::TcpListener;
use tempfile::{TempDir, tempdir};

/// Write an executable shell script standing in for the node binary.
#[cfg(unix)]
fn fake_node(dir: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("fake-geth");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
fn settings_for(dir: &TempDir, executable: &Path) -> GethSettings {
    GethSettings {
        geth_executable: Some(executable.to_string_lossy().into_owned()),
        ..GethSettings::dev(&dir.path().join("chain"))
    }
}

#[test]
fn test_new_requires_data_dir() {
    let settings = GethSettings {
        geth_executable: Some("sh".to_string()),
        ..GethSettings::default()
    };
    let err = GethProcess::new("local", settings).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::ProcessConstruction(msg)) if msg.contains("data_dir")
    ));
}

#[cfg(unix)]
#[test]
fn test_accessors_follow_settings() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exit 0");
    let mut settings = settings_for(&dir, &exe);
    settings.rpc_enabled = Some(true);
    settings.rpc_port = Some(8600);

    let node = GethProcess::new("local", settings).unwrap();

    assert_eq!(node.data_dir(), dir.path().join("chain"));
    assert!(node.is_mining());
    assert!(node.ipc_enabled());
    assert!(node.rpc_enabled());
    assert_eq!(node.rpc_port(), Some(8600));
    assert_eq!(node.ipc_path(), Some(dir.path().join("chain/geth.ipc")));
    assert_eq!(node.executable(), exe);
}

#[cfg(unix)]
#[test]
fn test_start_routes_output_to_log_sink() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "echo \"args: $*\"\necho oops >&2");
    let sink = LogSink::new(dir.path().join("out.log"), dir.path().join("err.log"));
    let mut node = GethProcess::new("local", settings_for(&dir, &exe))
        .unwrap()
        .with_log_sink(sink.clone());

    let running = node.start().unwrap();
    crate::ReadinessWaiter::new(Duration::from_secs(5))
        .with_poll_interval(Duration::from_millis(10))
        .wait(nk_core::ReadinessCondition::Ipc, || {
            fs::read_to_string(&sink.stderr_path).is_ok_and(|s| s.ends_with('\n'))
        })
        .unwrap();
    running.release().unwrap();

    let stdout = fs::read_to_string(&sink.stdout_path).unwrap();
    assert!(stdout.contains("--networkid 1234"), "{stdout}");
    assert!(stdout.contains("--nodiscover"), "{stdout}");
    assert_eq!(fs::read_to_string(&sink.stderr_path).unwrap(), "oops\n");
}

#[cfg(unix)]
#[test]
fn test_start_twice_rejected() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exit 0");
    let mut node = GethProcess::new("local", settings_for(&dir, &exe)).unwrap();

    let running = node.start().unwrap();
    assert!(node.start().is_err());
    running.release().unwrap();
}

#[cfg(unix)]
#[test]
fn test_release_interrupts_running_node() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exec sleep 30");
    let mut node = GethProcess::new("local", settings_for(&dir, &exe)).unwrap();

    let started = Instant::now();
    node.start().unwrap().release().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn test_release_kills_node_ignoring_interrupt() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "trap '' INT\nexec sleep 30");
    let mut node = GethProcess::new("local", settings_for(&dir, &exe))
        .unwrap()
        .with_stop_timeout(Duration::from_millis(200));

    let started = Instant::now();
    node.start().unwrap().release().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn test_stop_kills_node_when_polling_fails() {
    let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let pid = libc::pid_t::try_from(child.id()).unwrap();
    let mut node = RunningNode {
        label: "local".to_string(),
        child: Some(child),
        stop_timeout: Duration::from_secs(10),
    };

    let started = Instant::now();
    let err = node
        .stop_with(|_| Err(io::Error::other("wait status unavailable")))
        .unwrap_err();

    assert!(format!("{err:#}").contains("Failed to poll node 'local'"), "{err:#}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(node.pid().is_none());
    // Reaped: the pid no longer names a process of ours.
    assert_eq!(unsafe { libc::kill(pid, 0) }, -1);
    node.stop().unwrap();
}

#[cfg(unix)]
#[test]
fn test_stop_after_exit_is_quiet() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exit 0");
    let mut node = GethProcess::new("local", settings_for(&dir, &exe)).unwrap();
    let running = node.start().unwrap();
    thread::sleep(Duration::from_millis(300));

    let started = Instant::now();
    running.release().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[cfg(unix)]
#[test]
fn test_dag_readiness_tracks_ethash_file() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exit 0");
    let ethash = dir.path().join("ethash");
    let node = GethProcess::new("local", settings_for(&dir, &exe))
        .unwrap()
        .with_ethash_dir(&ethash);

    assert!(!node.is_dag_generated());
    fs::create_dir_all(&ethash).unwrap();
    fs::write(ethash.join(DAG_FILENAME), "").unwrap();
    assert!(node.is_dag_generated());
}

#[cfg(unix)]
#[test]
fn test_ipc_readiness_requires_socket() {
    use std::os::unix::net::UnixListener;

    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exit 0");
    let node = GethProcess::new("local", settings_for(&dir, &exe)).unwrap();
    let ipc = node.ipc_path().unwrap();
    fs::create_dir_all(ipc.parent().unwrap()).unwrap();

    assert!(!node.is_ipc_ready());
    fs::write(&ipc, "").unwrap();
    assert!(!node.is_ipc_ready());
    fs::remove_file(&ipc).unwrap();

    let _listener = UnixListener::bind(&ipc).unwrap();
    assert!(node.is_ipc_ready());
}

#[cfg(unix)]
#[test]
fn test_rpc_readiness_requires_listener() {
    let dir = tempdir().unwrap();
    let exe = fake_node(&dir, "exit 0");
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut settings = settings_for(&dir, &exe);
    settings.rpc_enabled = Some(true);
    settings.rpc_port = Some(port);
    let node = GethProcess::new("local", settings.clone()).unwrap();
    assert!(node.is_rpc_ready());

    settings.rpc_enabled = Some(false);
    let disabled = GethProcess::new("local", settings).unwrap();
    assert!(!disabled.is_rpc_ready());
}
