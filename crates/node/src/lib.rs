//! Local node process adapter.
//!
//! [`LocalNode`] supervises the chain-node subprocess for the shell:
//! spawning it under the configured settings, streaming its output as
//! log events and reporting process state transitions. [`ChainDataDir`]
//! owns destruction of the node's on-disk data for the wipe-and-restart
//! path.

mod chain_data;
mod config;
mod node;

pub use chain_data::ChainDataDir;
pub use config::NodeConfig;
pub use node::LocalNode;
