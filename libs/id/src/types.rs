//! Typed ID definitions used by the pool and the reactor.

use crate::define_id;

// A backend connection minted by a pool factory. Stable for the lifetime of
// the pool, across any number of open/close cycles.
define_id!(ConnectionId, "conn");

// One client/backend pairing, from accept to teardown.
define_id!(PairingId, "pair");
