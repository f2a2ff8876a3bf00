//! Test helpers shared by unit tests across modules.

#[allow(dead_code)]
pub(crate) mod fake_transport;
pub(crate) mod socket_guard;
