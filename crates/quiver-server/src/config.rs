use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use validator::Validate;

use quiver_client::{Client, ClientConfig};

use crate::state::AppState;

/// Process-wide settings resolved from the command line.
#[derive(Debug, Clone, Copy)]
pub struct GlobalConfig {
    /// Delete-ratio percentage that triggers database repacks.
    pub repack_percent: u32,
    /// Preallocation size for synthesised audio buffers.
    pub audio_buf_size: usize,
}

/// The on-disk configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Clients available to every session.
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,
    /// Id of the client registered as `default`.
    #[serde(default)]
    pub default: Option<String>,
}

/// Loads the configuration file: the explicit path must exist, the default
/// location (`$HOME/quiver.yaml`) is optional.
pub fn read_config_files(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => read_config_file(path, true),
        None => match default_config_path() {
            Some(path) => read_config_file(&path, false),
            None => Ok(ConfigFile::default()),
        },
    }
}

fn read_config_file(path: &Path, required: bool) -> Result<ConfigFile> {
    if !path.exists() {
        if required {
            bail!("config file not found: {}", path.display());
        }
        return Ok(ConfigFile::default());
    }

    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );

    let file: ConfigFile = if is_yaml {
        serde_yaml::from_slice(&bytes)
            .with_context(|| format!("failed to parse config file {}", path.display()))?
    } else {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse config file {}", path.display()))?
    };

    for (id, config) in &file.clients {
        config
            .validate()
            .with_context(|| format!("invalid config for client {id:?}"))?;
    }

    Ok(file)
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join("quiver.yaml"))
}

/// Builds the configured clients and registers them globally, resolving the
/// default client: the command-line override wins over the file, and a sole
/// configured client becomes the default implicitly.
pub fn init_clients(
    app: &Arc<AppState>,
    file: ConfigFile,
    default_override: Option<&str>,
) -> Result<()> {
    let mut clients = HashMap::new();

    for (id, config) in &file.clients {
        let client = Client::with_audio_buf_size(config, app.config.audio_buf_size)
            .with_context(|| format!("failed to create client {id:?}"))?;
        clients.insert(id.clone(), Arc::new(client));
    }

    let default = default_override
        .map(str::to_string)
        .or(file.default)
        .or_else(|| {
            if clients.len() == 1 {
                clients.keys().next().cloned()
            } else {
                None
            }
        });

    for (id, client) in &clients {
        app.global_clients.insert(id.clone(), Arc::clone(client));
    }

    if let Some(default) = &default {
        let Some(client) = clients.get(default) else {
            bail!("default client {default:?} not found");
        };
        app.global_clients
            .insert("default".to_string(), Arc::clone(client));
    }

    Ok(())
}
