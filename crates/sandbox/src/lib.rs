//! Policy gate in front of adapter dispatch.
//!
//! Every action reaching an adapter has passed through here: category
//! allow flags, the executable allow-list, and the risk threshold are
//! checked before any side effect, and `simulate` mode validates the
//! whole path without one.

pub mod options;
pub mod sandbox;

pub use options::SandboxOptions;
pub use sandbox::Sandbox;
