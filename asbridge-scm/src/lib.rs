//! asbridge-scm: the Server Communication Manager (§4.2-§4.6).
//!
//! Owns every per-`ServerId` tunnel and drives it through the role
//! handshake and data transfer on the SCM's own tokio task, exchanging
//! control and data messages with the WM exclusively through the
//! Broker.

pub mod factory;
pub mod record;
pub mod scm;

pub use factory::TunnelFactory;
pub use record::{RecordStatus, ServerRecord};
pub use scm::run;
