//! Handlers for `nodekeeper chain run` and `nodekeeper chain reset`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use nk_chain::{ChainContext, ChainSupervisor, ChainVariant};
use nk_config::{Config, ProjectConfigs};
use nk_process::{ReadinessTimeouts, reset_chain};
use tokio::sync::oneshot;
use tracing::info;

pub(crate) async fn handle_chain_run(
    project_dir: PathBuf,
    user_config: PathBuf,
    name: String,
    dag_timeout: Option<u64>,
    wait_timeout: Option<u64>,
) -> Result<()> {
    let configs = ProjectConfigs::load(&project_dir, &user_config)?;
    let timeouts = readiness_timeouts(dag_timeout, wait_timeout);
    let supervisor = ChainSupervisor::from_project(&configs, &name)?.with_timeouts(timeouts);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let running = Arc::new(AtomicBool::new(false));
    let running_flag = Arc::clone(&running);
    // The supervisor blocks while polling readiness; keep it off the runtime.
    let mut task = tokio::task::spawn_blocking(move || {
        run_until_shutdown(supervisor, shutdown_rx, &running_flag)
    });

    tokio::select! {
        result = &mut task => {
            return result.context("chain task join error")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            let running = running.load(Ordering::SeqCst);
            info!(chain = %name, running, "shutdown requested");
            eprintln!("{}", shutdown_notice(&name, running));
            // A send error means the chain already finished on its own.
            let _ = shutdown_tx.send(());
        }
    }

    task.await.context("chain task join error")?
}

fn run_until_shutdown(
    mut supervisor: ChainSupervisor,
    shutdown: oneshot::Receiver<()>,
    running: &AtomicBool,
) -> Result<()> {
    supervisor.with_running(|chain| {
        running.store(true, Ordering::SeqCst);
        let web3 = chain.web3_config()?;
        print!("{}", web3.to_json_pretty()?);
        eprintln!("Chain '{}' is running; press Ctrl-C to stop.", chain.name());
        // Sender dropped and explicit shutdown both end the run.
        let _ = shutdown.blocking_recv();
        Ok(())
    })
}

/// Readiness waits cannot be interrupted; the chain stops once they end.
fn shutdown_notice(name: &str, running: bool) -> String {
    if running {
        format!("Stopping chain '{name}'...")
    } else {
        format!(
            "Stopping chain '{name}' once its readiness checks finish \
             (bounded by --dag-timeout / --wait-timeout)..."
        )
    }
}

fn readiness_timeouts(dag_timeout: Option<u64>, wait_timeout: Option<u64>) -> ReadinessTimeouts {
    let mut timeouts = ReadinessTimeouts::default();
    if let Some(secs) = dag_timeout {
        timeouts.dag = Duration::from_secs(secs);
    }
    if let Some(secs) = wait_timeout {
        timeouts.ipc = Duration::from_secs(secs);
        timeouts.rpc = Duration::from_secs(secs);
    }
    timeouts
}

pub(crate) fn handle_chain_reset(
    project_dir: &Path,
    user_config: &Path,
    name: &str,
) -> Result<()> {
    let configs = ProjectConfigs::load(project_dir, user_config)?;
    let chain_config = configs.chain_config(name)?;
    let data_dir = local_data_dir(project_dir, name, &chain_config)?;
    reset_chain(&data_dir)?;
    eprintln!("Reset chain '{name}' at {}", data_dir.display());
    Ok(())
}

/// Data directory of a local chain; other chain kinds are refused.
fn local_data_dir(project_dir: &Path, name: &str, chain_config: &Config) -> Result<PathBuf> {
    let class = chain_config.get_str("chain.class").unwrap_or_default();
    let variant = ChainVariant::from_class(class)?;
    if variant != ChainVariant::Local {
        bail!("chain '{name}' is a {class}; only LocalChain chains can be reset");
    }
    let ctx = ChainContext::from_config(name, project_dir, chain_config)?;
    variant
        .data_dir(&ctx)?
        .with_context(|| format!("chain '{name}' has no data directory"))
}
