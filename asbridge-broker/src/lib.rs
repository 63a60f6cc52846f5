//! asbridge-broker: the thread-safe mailbox and flow controller between
//! the Workspace Manager (WM) and Server Communication Manager (SCM).
//!
//! [`Broker`] is the only shared mutable state in the whole
//! communication subsystem (§5): both sides only ever touch it through
//! the operations here, never a record or tunnel directly.

pub mod broker;
pub mod quench;

pub use broker::Broker;
pub use quench::Quench;
