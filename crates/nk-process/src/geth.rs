//! Geth-compatible node process.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nk_core::AppError;
use nk_resource::ScopedResource;
use tracing::{debug, info, warn};

use crate::NodeProcess;
use crate::command::{build_command, resolve_executable};
use crate::layout::{self, DAG_FILENAME};
use crate::log_sink::LogSink;
use crate::settings::GethSettings;

/// Time allowed between SIGINT and a forced kill.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);
const RPC_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct GethProcess {
    label: String,
    executable: PathBuf,
    settings: GethSettings,
    data_dir: PathBuf,
    log_sink: Option<LogSink>,
    ethash_dir: PathBuf,
    stop_timeout: Duration,
    started: bool,
}

impl GethProcess {
    /// Validate `settings` and resolve the executable. Fails with
    /// [`AppError::ProcessConstruction`] when `data_dir` is missing or the
    /// executable cannot be found.
    pub fn new(label: impl Into<String>, settings: GethSettings) -> Result<Self> {
        let label = label.into();
        let data_dir = settings.data_dir.clone().ok_or_else(|| {
            AppError::ProcessConstruction(format!("node '{label}' has no data_dir"))
        })?;
        let executable = resolve_executable(&settings)?;
        let ethash_dir = layout::default_ethash_dir().unwrap_or_else(|| data_dir.join(".ethash"));
        debug!(%label, executable = %executable.display(), "node process configured");

        Ok(Self {
            label,
            executable,
            settings,
            data_dir,
            log_sink: None,
            ethash_dir,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            started: false,
        })
    }

    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn with_ethash_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ethash_dir = dir.into();
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn settings(&self) -> &GethSettings {
        &self.settings
    }

    pub fn log_sink(&self) -> Option<&LogSink> {
        self.log_sink.as_ref()
    }
}

impl NodeProcess for GethProcess {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn is_mining(&self) -> bool {
        self.settings.is_mining()
    }

    fn ipc_enabled(&self) -> bool {
        self.settings.ipc_enabled()
    }

    fn rpc_enabled(&self) -> bool {
        self.settings.rpc_enabled()
    }

    fn ipc_path(&self) -> Option<PathBuf> {
        self.settings.effective_ipc_path()
    }

    fn rpc_port(&self) -> Option<u16> {
        self.settings.effective_rpc_port()
    }

    fn is_dag_generated(&self) -> bool {
        self.ethash_dir.join(DAG_FILENAME).is_file()
    }

    fn is_ipc_ready(&self) -> bool {
        self.ipc_path().is_some_and(|path| is_socket(&path))
    }

    fn is_rpc_ready(&self) -> bool {
        self.rpc_port().is_some_and(|port| {
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
            TcpStream::connect_timeout(&addr, RPC_CONNECT_TIMEOUT).is_ok()
        })
    }

    fn start(&mut self) -> Result<Box<dyn ScopedResource>> {
        if self.started {
            anyhow::bail!("node '{}' was already started", self.label);
        }

        let mut cmd = build_command(&self.executable, &self.settings);
        cmd.stdin(Stdio::null());
        match &self.log_sink {
            Some(sink) => sink.attach(&mut cmd)?,
            None => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn node '{}'", self.label))?;
        self.started = true;
        info!(label = %self.label, pid = child.id(), "node started");

        Ok(Box::new(RunningNode {
            label: self.label.clone(),
            child: Some(child),
            stop_timeout: self.stop_timeout,
        }))
    }
}

#[cfg(unix)]
fn is_socket(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::metadata(path).is_ok_and(|m| m.file_type().is_socket())
}

#[cfg(not(unix))]
fn is_socket(path: &Path) -> bool {
    path.exists()
}

/// Handle to a spawned node. Stopping sends SIGINT, waits up to the stop
/// timeout, then kills. Dropping the handle stops the node.
#[derive(Debug)]
pub struct RunningNode {
    label: String,
    child: Option<Child>,
    stop_timeout: Duration,
}

impl RunningNode {
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.stop_with(Child::try_wait)
    }

    fn stop_with(
        &mut self,
        mut poll: impl FnMut(&mut Child) -> io::Result<Option<ExitStatus>>,
    ) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        match self.interrupt_and_wait(&mut child, &mut poll) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(
                    label = %self.label,
                    timeout = ?self.stop_timeout,
                    "node ignored interrupt, killing"
                );
                kill_and_reap(&mut child)
                    .with_context(|| format!("Failed to kill node '{}'", self.label))
            }
            Err(error) => {
                // The handle is gone after this call; the process must not outlive it.
                if let Err(kill_error) = kill_and_reap(&mut child) {
                    warn!(label = %self.label, error = %kill_error, "failed to kill node");
                }
                Err(error).with_context(|| format!("Failed to poll node '{}'", self.label))
            }
        }
    }

    /// `Ok(false)` when the node is still running after the stop timeout.
    fn interrupt_and_wait(
        &self,
        child: &mut Child,
        poll: &mut impl FnMut(&mut Child) -> io::Result<Option<ExitStatus>>,
    ) -> io::Result<bool> {
        if let Some(status) = poll(child)? {
            debug!(label = %self.label, %status, "node already exited");
            return Ok(true);
        }

        send_interrupt(child);
        let start = Instant::now();
        loop {
            if let Some(status) = poll(child)? {
                info!(label = %self.label, %status, "node stopped");
                return Ok(true);
            }
            if start.elapsed() >= self.stop_timeout {
                return Ok(false);
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }
}

fn kill_and_reap(child: &mut Child) -> io::Result<()> {
    child.kill()?;
    child.wait()?;
    Ok(())
}

#[cfg(unix)]
fn send_interrupt(child: &Child) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill() is async-signal-safe; the child has not been reaped.
    unsafe {
        libc::kill(pid, libc::SIGINT);
    }
}

#[cfg(not(unix))]
fn send_interrupt(_child: &Child) {}

impl ScopedResource for RunningNode {
    fn label(&self) -> String {
        format!("node '{}'", self.label)
    }

    fn release(mut self: Box<Self>) -> Result<()> {
        self.stop()
    }
}

impl Drop for RunningNode {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(label = %self.label, error = %e, "failed to stop node");
        }
    }
}

#[cfg(test)]
#[path = "geth_tests.rs"]
mod tests;
