//! # Strafe Bridge
//!
//! The seam between the host process and the extension layer. The host
//! calls one [`HostBridge`] method per engine event; the bridge runs the
//! matching hook chain and answers with a reply the host can act on
//! directly: pass, suppress, or substitute.
//!
//! Nothing here panics outward. A fault anywhere in the extension layer is
//! logged and the host gets the reply it would have gotten from an empty
//! hook chain.

pub mod bridge;
pub mod configstring;

pub use bridge::{ConnectReply, EventReply, HostBridge, DEFAULT_BAN_MESSAGE};
pub use configstring::{parse_variables, CS_SERVERINFO, GAMESTATE_KEY};
