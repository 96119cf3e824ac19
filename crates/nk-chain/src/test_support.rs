use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use nk_process::NodeProcess;
use nk_resource::ScopedResource;

pub type EventLog = Arc<Mutex<Vec<String>>>;

/// In-memory node whose readiness is fixed by its fields.
pub struct StubProcess {
    pub data_dir: PathBuf,
    pub mining: bool,
    pub ipc_path: Option<PathBuf>,
    pub rpc_port: Option<u16>,
    pub dag_ready: bool,
    pub ipc_ready: bool,
    pub rpc_ready: bool,
    pub fail_start: bool,
    pub events: EventLog,
}

impl StubProcess {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            ipc_path: Some(data_dir.join("geth.ipc")),
            data_dir,
            mining: false,
            rpc_port: None,
            dag_ready: true,
            ipc_ready: true,
            rpc_ready: true,
            fail_start: false,
            events: EventLog::default(),
        }
    }
}

struct StubGuard {
    events: EventLog,
}

impl ScopedResource for StubGuard {
    fn label(&self) -> String {
        "stub node".to_string()
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.events.lock().unwrap().push("stopped".to_string());
        Ok(())
    }
}

impl NodeProcess for StubProcess {
    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn is_mining(&self) -> bool {
        self.mining
    }

    fn ipc_enabled(&self) -> bool {
        self.ipc_path.is_some()
    }

    fn rpc_enabled(&self) -> bool {
        self.rpc_port.is_some()
    }

    fn ipc_path(&self) -> Option<PathBuf> {
        self.ipc_path.clone()
    }

    fn rpc_port(&self) -> Option<u16> {
        self.rpc_port
    }

    fn is_dag_generated(&self) -> bool {
        self.dag_ready
    }

    fn is_ipc_ready(&self) -> bool {
        self.ipc_ready
    }

    fn is_rpc_ready(&self) -> bool {
        self.rpc_ready
    }

    fn start(&mut self) -> Result<Box<dyn ScopedResource>> {
        if self.fail_start {
            anyhow::bail!("stub refused to start");
        }
        self.events.lock().unwrap().push("started".to_string());
        Ok(Box::new(StubGuard {
            events: Arc::clone(&self.events),
        }))
    }
}
