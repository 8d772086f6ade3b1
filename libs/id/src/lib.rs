//! # relay-id
//!
//! Typed identifiers for the relay.
//!
//! ## ID Format
//!
//! Every ID is a prefixed ULID: `{prefix}_{ulid}`
//!
//! Examples:
//! - `conn_01HV4Z2WQXKJNM8GPQY6VBKC3D` (a pooled backend connection)
//! - `pair_01HV4Z3MXNKPQR9HSTZ7WCLD4E` (one client/backend pairing)
//!
//! The prefix keeps a connection ID from being mistaken for a pairing ID in
//! logs, and the ULID keeps IDs minted later sorting after earlier ones.

mod macros;
mod types;

pub use types::*;

/// Re-export ulid for the macro expansion.
pub use ulid::Ulid;
