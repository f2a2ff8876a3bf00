#![allow(dead_code)]

pub(crate) mod socket_guard;
