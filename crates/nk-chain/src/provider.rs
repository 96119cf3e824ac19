//! Web3 provider settings derived from a running node.

use anyhow::Result;
use nk_config::Config;
use nk_core::AppError;
use nk_process::NodeProcess;
use serde_json::Value;
use tracing::debug;

pub const IPC_PROVIDER_CLASS: &str = "web3.IPCProvider";
pub const HTTP_PROVIDER_CLASS: &str = "web3.HTTPProvider";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderClass {
    Ipc,
    Http,
    Other(String),
}

impl ProviderClass {
    pub fn parse(class: &str) -> Self {
        match class {
            IPC_PROVIDER_CLASS => Self::Ipc,
            HTTP_PROVIDER_CLASS => Self::Http,
            other => Self::Other(other.to_string()),
        }
    }
}

pub struct ProviderConfigResolver;

impl ProviderConfigResolver {
    /// Fill in `provider.settings` of a web3 config section for `process`.
    ///
    /// Always returns an independent copy of `base`. Non-empty explicit
    /// settings are kept as they are; an empty settings mapping counts as
    /// unset.
    pub fn resolve(base: &Config, process: &dyn NodeProcess) -> Result<Config> {
        let mut resolved = base.unref();

        let has_settings = matches!(
            resolved.get("provider.settings"),
            Some(Value::Object(settings)) if !settings.is_empty()
        );
        if has_settings {
            debug!("using explicit provider settings");
            return Ok(resolved);
        }

        let class = resolved.get_str("provider.class").unwrap_or_default().to_string();
        match ProviderClass::parse(&class) {
            ProviderClass::Ipc => {
                let ipc_path = process.ipc_path().ok_or_else(|| {
                    AppError::UnsupportedProvider(format!("{class} (IPC is disabled)"))
                })?;
                resolved.set(
                    "provider.settings.ipc_path",
                    ipc_path.to_string_lossy().into_owned(),
                )?;
            }
            ProviderClass::Http => {
                let port = process.rpc_port().ok_or_else(|| {
                    AppError::UnsupportedProvider(format!("{class} (RPC is disabled)"))
                })?;
                resolved.set(
                    "provider.settings.endpoint_uri",
                    format!("http://127.0.0.1:{port}"),
                )?;
            }
            ProviderClass::Other(_) if class.is_empty() => {
                return Err(AppError::UnsupportedProvider("<unset>".to_string()).into());
            }
            ProviderClass::Other(other) => {
                return Err(AppError::UnsupportedProvider(other).into());
            }
        }
        Ok(resolved)
    }
}
