//! Flutter-facing bindings for the venue engagement core.

pub mod api;
