//! Lifecycle of one chain: build the node process, start it, wait for its
//! readiness gates, and release everything it acquired.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nk_config::{Config, ProjectConfigs};
use nk_core::ReadinessCondition;
use nk_process::{GethSettings, NodeProcess, ReadinessTimeouts};
use nk_resource::ResourceScope;
use serde_json::Value;
use tracing::{info, warn};

use crate::provider::ProviderConfigResolver;
use crate::variants::ChainVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Uninitialized,
    Initialized,
    /// `enter()` is in progress, or failed part-way.
    Starting,
    Running,
    Closed,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What a process factory knows about the chain it builds for.
#[derive(Debug, Clone)]
pub struct ChainContext {
    pub name: String,
    pub project_dir: PathBuf,
    /// Node settings from `chain.settings`, applied over variant defaults.
    pub settings: GethSettings,
}

impl ChainContext {
    /// Context for the chain section `chain_config`. `chain.settings` is read
    /// as the merge of every config layer, so a project that overrides one
    /// setting keeps the user's other settings.
    pub fn from_config(
        name: impl Into<String>,
        project_dir: &Path,
        chain_config: &Config,
    ) -> Result<Self> {
        let name = name.into();
        let raw = match chain_config.get("chain.settings") {
            Some(Value::Object(_)) => chain_config.get_config("chain.settings").to_value(),
            Some(other) => other.clone(),
            None => Value::Null,
        };
        let settings = GethSettings::from_value(&raw)
            .with_context(|| format!("Invalid settings for chain '{name}'"))?;
        Ok(Self {
            name,
            project_dir: project_dir.to_path_buf(),
            settings,
        })
    }
}

/// Builds the node process of a chain. Resources the process depends on
/// (temporary directories, for instance) are pushed into the scope.
pub type ProcessFactory =
    Box<dyn FnMut(&ChainContext, &mut ResourceScope) -> Result<Box<dyn NodeProcess>> + Send>;

pub struct ChainSupervisor {
    context: ChainContext,
    web3: Config,
    factory: ProcessFactory,
    timeouts: ReadinessTimeouts,
    state: ChainState,
    scope: Option<ResourceScope>,
    process: Option<Box<dyn NodeProcess>>,
}

impl ChainSupervisor {
    /// Supervisor for the chain section `chain_config` (`chains.<name>`),
    /// with an explicit process factory.
    pub fn new(
        name: impl Into<String>,
        project_dir: &Path,
        chain_config: &Config,
        factory: ProcessFactory,
    ) -> Result<Self> {
        Ok(Self {
            context: ChainContext::from_config(name, project_dir, chain_config)?,
            web3: chain_config.get_config("web3").unref(),
            factory,
            timeouts: ReadinessTimeouts::default(),
            state: ChainState::Uninitialized,
            scope: None,
            process: None,
        })
    }

    /// Supervisor whose factory is picked from `chain.class`.
    pub fn from_config(
        name: impl Into<String>,
        project_dir: &Path,
        chain_config: &Config,
    ) -> Result<Self> {
        let name = name.into();
        let class = chain_config
            .get_str("chain.class")
            .with_context(|| format!("chain '{name}' has no chain.class"))?;
        let variant = ChainVariant::from_class(class)?;
        Self::new(name, project_dir, chain_config, variant.factory())
    }

    pub fn from_project(configs: &ProjectConfigs, name: &str) -> Result<Self> {
        let chain_config = configs.chain_config(name)?;
        Self::from_config(name, configs.project_dir(), &chain_config)
    }

    pub fn with_timeouts(mut self, timeouts: ReadinessTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn context(&self) -> &ChainContext {
        &self.context
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn timeouts(&self) -> &ReadinessTimeouts {
        &self.timeouts
    }

    /// The node process, once initialized and until exit.
    pub fn process(&self) -> Option<&dyn NodeProcess> {
        self.process.as_deref()
    }

    /// Open a fresh scope and build the node process into it.
    ///
    /// A factory failure releases whatever it had already acquired and
    /// leaves the supervisor uninitialized.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != ChainState::Uninitialized {
            bail!(
                "chain '{}' cannot be initialized while {}",
                self.context.name,
                self.state
            );
        }

        let mut scope = ResourceScope::new();
        match (self.factory)(&self.context, &mut scope) {
            Ok(process) => {
                info!(
                    chain = %self.context.name,
                    data_dir = %process.data_dir().display(),
                    "chain initialized"
                );
                self.process = Some(process);
                self.scope = Some(scope);
                self.state = ChainState::Initialized;
                Ok(())
            }
            Err(err) => {
                if let Err(close_err) = scope.close() {
                    warn!(
                        chain = %self.context.name,
                        error = %close_err,
                        "cleanup after failed initialize"
                    );
                }
                Err(err)
            }
        }
    }

    /// Start the node and block until every enabled readiness gate passes.
    ///
    /// On failure the state stays `Starting` and the scope keeps the started
    /// node; call [`ChainSupervisor::exit`] to release it.
    pub fn enter(&mut self) -> Result<()> {
        if self.state != ChainState::Initialized {
            bail!(
                "chain '{}' cannot be entered while {}",
                self.context.name,
                self.state
            );
        }
        let (Some(process), Some(scope)) = (self.process.as_mut(), self.scope.as_mut()) else {
            bail!("chain '{}' has no node process", self.context.name);
        };
        self.state = ChainState::Starting;

        let running = process.start()?;
        scope.push_boxed(running)?;

        if process.is_mining() {
            info!(chain = %self.context.name, "waiting for DAG generation");
            self.timeouts
                .waiter(ReadinessCondition::Dag)
                .wait(ReadinessCondition::Dag, || process.is_dag_generated())?;
        }
        if process.ipc_enabled() {
            self.timeouts
                .waiter(ReadinessCondition::Ipc)
                .wait(ReadinessCondition::Ipc, || process.is_ipc_ready())?;
        }
        if process.rpc_enabled() {
            self.timeouts
                .waiter(ReadinessCondition::Rpc)
                .wait(ReadinessCondition::Rpc, || process.is_rpc_ready())?;
        }

        self.state = ChainState::Running;
        info!(chain = %self.context.name, "chain running");
        Ok(())
    }

    /// Release everything in the scope, newest first. The state becomes
    /// `Closed` even when a release fails. Calling again is a no-op.
    pub fn exit(&mut self) -> Result<()> {
        if self.state == ChainState::Closed {
            return Ok(());
        }
        let result = match self.scope.take() {
            Some(mut scope) => scope.close(),
            None => Ok(()),
        };
        self.process = None;
        self.state = ChainState::Closed;
        info!(chain = %self.context.name, "chain closed");
        result
    }

    /// Run `f` against a running chain, always exiting afterwards. The first
    /// error wins; an exit failure is only reported when `f` succeeded.
    pub fn with_running<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = self
            .initialize()
            .and_then(|()| self.enter())
            .and_then(|()| f(self));
        let exited = self.exit();
        match (result, exited) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Err(exit_err)) => {
                warn!(chain = %self.context.name, error = %exit_err, "exit after failure");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
        }
    }

    /// Web3 config of a running chain with provider settings filled in.
    pub fn web3_config(&self) -> Result<Config> {
        let process = match (&self.process, self.state) {
            (Some(process), ChainState::Running) => &**process,
            _ => bail!(
                "chain '{}' is not running ({})",
                self.context.name,
                self.state
            ),
        };
        ProviderConfigResolver::resolve(&self.web3, process)
    }
}

impl Drop for ChainSupervisor {
    fn drop(&mut self) {
        if let Err(err) = self.exit() {
            warn!(chain = %self.context.name, error = %err, "failed to release chain resources");
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
