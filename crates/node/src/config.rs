use std::path::PathBuf;
use std::time::Duration;

use chainshell_core::{Network, NodeType, SyncMode};

const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Launch settings for the supervised node process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub binary: PathBuf,
    pub data_dir: PathBuf,
    pub node_type: NodeType,
    pub network: Network,
    pub sync_mode: SyncMode,
    /// Extra flags appended verbatim after the managed ones.
    pub extra_args: Vec<String>,
    /// How long the process may stay silent before a connection timeout
    /// is reported.
    pub startup_timeout: Duration,
}

impl NodeConfig {
    pub fn new(binary: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            data_dir: data_dir.into(),
            node_type: NodeType::default(),
            network: Network::default(),
            sync_mode: SyncMode::default(),
            extra_args: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// Command-line arguments for one launch of the node binary.
pub(crate) fn build_args(config: &NodeConfig) -> Vec<String> {
    let mut args = vec![
        "--datadir".to_string(),
        config.data_dir.display().to_string(),
        "--network".to_string(),
        config.network.as_str().to_string(),
        "--syncmode".to_string(),
        config.sync_mode.as_str().to_string(),
    ];
    if config.node_type == NodeType::Lite {
        args.push("--lite".to_string());
    }
    args.extend(config.extra_args.iter().cloned());
    args
}
