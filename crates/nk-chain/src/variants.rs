//! Built-in chain kinds and the process factory each one supplies.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nk_config::paths;
use nk_core::AppError;
use nk_process::layout;
use nk_process::{GethProcess, GethSettings, LogSink, NodeProcess};
use nk_resource::ResourceScope;
use tracing::{debug, warn};

use crate::supervisor::{ChainContext, ProcessFactory};

const TEMP_DIR_PREFIX: &str = "nodekeeper-chain-";
const MAINNET_LOG_NAME: &str = "mainnet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVariant {
    /// Private dev chain persisted under `<project>/chains/<name>`.
    Local,
    /// Private dev chain in a temporary directory removed on exit.
    Temporary,
    Testnet,
    Mainnet,
}

impl ChainVariant {
    pub fn from_class(class: &str) -> Result<Self> {
        match class {
            "LocalChain" => Ok(Self::Local),
            "TemporaryChain" => Ok(Self::Temporary),
            "TestnetChain" => Ok(Self::Testnet),
            "MainnetChain" => Ok(Self::Mainnet),
            other => bail!("unknown chain class '{other}'"),
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Self::Local => "LocalChain",
            Self::Temporary => "TemporaryChain",
            Self::Testnet => "TestnetChain",
            Self::Mainnet => "MainnetChain",
        }
    }

    /// Persistent data directory, `None` for a temporary chain.
    pub fn data_dir(self, ctx: &ChainContext) -> Result<Option<PathBuf>> {
        let configured = ctx.settings.data_dir.clone();
        let dir = match self {
            Self::Temporary => {
                if configured.is_some() {
                    warn!(chain = %ctx.name, "data_dir is ignored for temporary chains");
                }
                return Ok(None);
            }
            Self::Local => configured.unwrap_or_else(|| {
                paths::chain_data_dir(&paths::blockchains_dir(&ctx.project_dir), &ctx.name)
            }),
            Self::Testnet => match configured.or_else(layout::default_testnet_dir) {
                Some(dir) => dir,
                None => return Err(no_home_dir(ctx)),
            },
            Self::Mainnet => match configured.or_else(layout::default_ethereum_dir) {
                Some(dir) => dir,
                None => return Err(no_home_dir(ctx)),
            },
        };
        Ok(Some(dir))
    }

    /// Variant defaults for `data_dir` overlaid with the chain's own settings.
    pub fn node_settings(self, ctx: &ChainContext, data_dir: &Path) -> GethSettings {
        let defaults = match self {
            Self::Local | Self::Temporary => GethSettings::dev(data_dir),
            Self::Testnet => GethSettings::testnet(data_dir),
            Self::Mainnet => GethSettings::mainnet(data_dir),
        };
        let mut settings = defaults.overlay(ctx.settings.clone());
        settings.data_dir = Some(data_dir.to_path_buf());
        settings
    }

    /// Chain name used in log file names.
    pub fn log_name(self, chain_name: &str) -> &str {
        match self {
            Self::Mainnet => MAINNET_LOG_NAME,
            _ => chain_name,
        }
    }

    pub fn log_sink(self, ctx: &ChainContext) -> LogSink {
        let name = self.log_name(&ctx.name);
        LogSink::new(
            paths::geth_log_path(&ctx.project_dir, name, "stdout"),
            paths::geth_log_path(&ctx.project_dir, name, "stderr"),
        )
    }

    pub fn factory(self) -> ProcessFactory {
        Box::new(move |ctx: &ChainContext, scope: &mut ResourceScope| {
            self.build_process(ctx, scope)
        })
    }

    fn build_process(
        self,
        ctx: &ChainContext,
        scope: &mut ResourceScope,
    ) -> Result<Box<dyn NodeProcess>> {
        let data_dir = match self.data_dir(ctx)? {
            Some(dir) => {
                if matches!(self, Self::Local) {
                    fs::create_dir_all(&dir).with_context(|| {
                        format!("Failed to create chain directory {}", dir.display())
                    })?;
                }
                dir
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(TEMP_DIR_PREFIX)
                    .tempdir()
                    .context("Failed to create temporary chain directory")?;
                let dir = temp.path().to_path_buf();
                scope.push(temp)?;
                dir
            }
        };
        debug!(
            chain = %ctx.name,
            variant = self.class_name(),
            data_dir = %data_dir.display(),
            "building node process"
        );

        let settings = self.node_settings(ctx, &data_dir);
        let process =
            GethProcess::new(ctx.name.clone(), settings)?.with_log_sink(self.log_sink(ctx));
        Ok(Box::new(process))
    }
}

fn no_home_dir(ctx: &ChainContext) -> anyhow::Error {
    AppError::ProcessConstruction(format!(
        "chain '{}': cannot determine the home directory; set chain.settings.data_dir",
        ctx.name
    ))
    .into()
}
