//! asbridge-protocol: wire types for the asbridge client-to-application-server link
//!
//! This crate defines the identity, envelope, handshake, and framing
//! types shared by every asbridge crate: [`ServerId`], the
//! [`ControlMsg`]/[`DataMsg`] envelopes carried across the Broker, the
//! role handshake, and the length-prefixed bincode codec a concrete
//! tunnel implementation frames them with.

pub mod codec;
pub mod envelope;
pub mod handshake;
pub mod server_id;

pub use codec::{CodecError, PayloadCodec};
pub use envelope::{ControlMsg, DataMsg};
pub use handshake::{RoleHeader, RoleReply, RoleRequest, RoleResponseCode, ROLE_WORKSPACE};
pub use server_id::ServerId;

/// Protocol major version this crate speaks. A peer advertising a
/// different major is not addressed by this implementation (the
/// distilled spec treats major mismatches as out of scope; only minor
/// compatibility is negotiated).
pub const PROTOCOL_MAJOR: u32 = 1;

/// Current protocol minor version.
pub const PROTOCOL_MINOR: u32 = 6;

/// The oldest server minor this client still accepts.
pub const LAST_COMPATIBLE_MINOR: u32 = 3;
