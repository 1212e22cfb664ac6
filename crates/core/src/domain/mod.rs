mod key;
mod node;
mod phase;
mod session;
mod sync;

pub use key::KeyRecord;
pub use node::{Network, NodeState, NodeType, SyncMode};
pub use phase::{Phase, PhaseMachine};
pub use session::Session;
pub use sync::SyncProgress;
