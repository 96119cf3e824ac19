//! Node process management: settings, command construction, spawning with
//! log routing, readiness probing, and graceful shutdown.

pub mod command;
pub mod geth;
pub mod layout;
pub mod log_sink;
pub mod readiness;
pub mod settings;

use std::path::{Path, PathBuf};

use anyhow::Result;
use nk_resource::ScopedResource;

pub use geth::{GethProcess, RunningNode};
pub use layout::reset_chain;
pub use log_sink::LogSink;
pub use readiness::{ReadinessTimeouts, ReadinessWaiter};
pub use settings::GethSettings;

/// One externally managed node process.
///
/// `start` launches the process and hands back a resource that stops it
/// when released, so ownership of the running process can live in a
/// [`nk_resource::ResourceScope`]. The remaining methods describe the
/// configured process and probe its readiness gates.
pub trait NodeProcess: Send {
    fn data_dir(&self) -> &Path;

    fn is_mining(&self) -> bool;
    fn ipc_enabled(&self) -> bool;
    fn rpc_enabled(&self) -> bool;

    /// IPC socket path, `None` when IPC is disabled.
    fn ipc_path(&self) -> Option<PathBuf>;
    /// RPC port, `None` when RPC is disabled.
    fn rpc_port(&self) -> Option<u16>;

    fn is_dag_generated(&self) -> bool;
    fn is_ipc_ready(&self) -> bool;
    fn is_rpc_ready(&self) -> bool;

    fn start(&mut self) -> Result<Box<dyn ScopedResource>>;
}
