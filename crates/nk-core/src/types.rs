use serde::{Deserialize, Serialize};

/// Readiness gate a node process must pass before it is considered running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessCondition {
    /// Mining DAG generated.
    Dag,
    /// IPC socket present.
    Ipc,
    /// RPC port accepting connections.
    Rpc,
}

impl ReadinessCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dag => "dag",
            Self::Ipc => "ipc",
            Self::Rpc => "rpc",
        }
    }
}

impl std::fmt::Display for ReadinessCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
