//! Ticket authentication for the HTTPS transport.

pub(crate) mod application;
