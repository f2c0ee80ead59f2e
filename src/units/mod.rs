//! Domain-specific pipelines: ALU, BRU, MLU, DVU, LSU. Each consumes
//! command packets on an input port and produces result packets on an
//! output port, self-ticking at a configured period.

pub mod alu;
pub mod bru;
pub mod dvu;
pub mod lsu;
pub mod mlu;

pub use alu::Alu;
pub use bru::Bru;
pub use dvu::Dvu;
pub use lsu::Lsu;
pub use mlu::Mlu;
