//! The tagged value carried by ports and connections. One `Packet` variant
//! per command/result family; downcasting a polymorphic hierarchy becomes a
//! `match`.

use crate::units::alu::AluOp;
use crate::units::bru::BruOp;
use crate::units::dvu::DivOp;
use crate::units::mlu::MulOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsuOp {
    Load,
    Store,
    VectorLoad,
    VectorStore,
}

/// Fields shared by every packet, mirroring the base `{timestamp, valid}`
/// envelope from the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub timestamp: u64,
    pub valid: bool,
}

impl Envelope {
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp, valid: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluCommand {
    pub env: Envelope,
    pub rd: u32,
    pub op: AluOp,
    pub src1: u32,
    pub src2: u32,
    pub src3: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub env: Envelope,
    pub rd: u32,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BruCommand {
    pub env: Envelope,
    pub pc: u32,
    pub target: u32,
    pub op: BruOp,
    pub rs1_val: u32,
    pub rs2_val: u32,
    pub rd: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BruResult {
    pub env: Envelope,
    pub rd: u32,
    pub taken: bool,
    pub target: u32,
    pub link_valid: bool,
    pub link_data: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MluCommand {
    pub env: Envelope,
    pub rd: u32,
    pub op: MulOp,
    pub src1: u32,
    pub src2: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MluResult {
    pub env: Envelope,
    pub rd: u32,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvuCommand {
    pub env: Envelope,
    pub rd: u32,
    pub op: DivOp,
    pub dividend: i32,
    pub divisor: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvuResult {
    pub env: Envelope,
    pub rd: u32,
    pub value: u32,
    pub div_by_zero: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsuRequest {
    pub env: Envelope,
    pub rd: u32,
    pub op: LsuOp,
    pub address: u64,
    pub data: u32,
    pub stride: u32,
    pub length: u32,
    pub mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsuResponse {
    pub env: Envelope,
    pub rd: u32,
    pub data: u32,
    pub success: bool,
}

/// A raw unsigned value, used for the credit-port signal and other simple
/// integer/boolean scalar traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarPacket {
    pub env: Envelope,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Scalar(ScalarPacket),
    AluCommand(AluCommand),
    AluResult(AluResult),
    BruCommand(BruCommand),
    BruResult(BruResult),
    MluCommand(MluCommand),
    MluResult(MluResult),
    DvuCommand(DvuCommand),
    DvuResult(DvuResult),
    LsuRequest(LsuRequest),
    LsuResponse(LsuResponse),
}

impl Packet {
    pub fn timestamp(&self) -> u64 {
        match self {
            Packet::Scalar(p) => p.env.timestamp,
            Packet::AluCommand(p) => p.env.timestamp,
            Packet::AluResult(p) => p.env.timestamp,
            Packet::BruCommand(p) => p.env.timestamp,
            Packet::BruResult(p) => p.env.timestamp,
            Packet::MluCommand(p) => p.env.timestamp,
            Packet::MluResult(p) => p.env.timestamp,
            Packet::DvuCommand(p) => p.env.timestamp,
            Packet::DvuResult(p) => p.env.timestamp,
            Packet::LsuRequest(p) => p.env.timestamp,
            Packet::LsuResponse(p) => p.env.timestamp,
        }
    }

    pub fn as_scalar(&self) -> Option<u32> {
        match self {
            Packet::Scalar(p) if p.env.valid => Some(p.value),
            _ => None,
        }
    }
}
