//! asbridge-wm: the workspace manager collaborator contract (§4.7).
//!
//! Application-level logic (sessions, panes, workspaces — explicitly
//! out of scope here) plugs into the communication subsystem through
//! [`WorkspaceManager`]; this crate owns only the contract and a
//! reference driver loop, never any workspace semantics.

pub mod driver;
pub mod handler;

pub use driver::run_wm;
pub use handler::{CallbackWorkspaceManager, WmCommand, WmCommandSender, WorkspaceManager};
