//! Handler for `nodekeeper config get`.

use std::path::Path;

use anyhow::{Result, bail};
use nk_config::{Config, ProjectConfigs};
use serde_json::Value;

pub(crate) fn handle_config_get(project_dir: &Path, user_config: &Path, key: &str) -> Result<()> {
    let configs = ProjectConfigs::load(project_dir, user_config)?;
    println!("{}", render_value(configs.config(), key)?);
    Ok(())
}

/// Strings print bare; everything else as pretty JSON. Sections include
/// values inherited from fallback layers.
fn render_value(config: &Config, key: &str) -> Result<String> {
    match config.get(key) {
        None => bail!("config key '{key}' is not set"),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Object(_)) => {
            let section = config.get_config(key).to_value();
            Ok(serde_json::to_string_pretty(&section)?)
        }
        Some(other) => Ok(serde_json::to_string_pretty(other)?),
    }
}
