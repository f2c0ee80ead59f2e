//! Connection variants transferring packets between ports: [`Wire`],
//! [`ReadyValid`], [`Credit`], and [`Link`]. All four share the same shape
//! of propagate call (`propagate(&mut self, src, dst, now)`), take the
//! current time as a parameter rather than owning a scheduler reference,
//! and report back-pressure via plain counters rather than errors — only
//! `Unbound` (checked once at `start()`) is a hard error.

pub mod credit;
pub mod link;
pub mod ready_valid;
pub mod wire;

pub use credit::Credit;
pub use link::Link;
pub use ready_valid::ReadyValid;
pub use wire::Wire;
