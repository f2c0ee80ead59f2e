//! In-order dispatch: pulls up to `lanes` decoded instructions per cycle out
//! of the fetch/decode buffer and pushes them to functional units under the
//! hazard/resource/slot/control-flow rules. Each unit already exposes a
//! direct `accept`/`submit` call (not a port) so more than one ALU/BRU
//! instruction can leave in the same cycle; MLU/DVU/LSU share one shot per
//! cycle between them.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::decode::{DecodedInstruction, OpType, FUNCT12_EBREAK, FUNCT12_ECALL, FUNCT12_MRET, FUNCT12_WFI};
use crate::packet::{AluCommand, BruCommand, DvuCommand, Envelope, LsuOp, LsuRequest, MluCommand};
use crate::regfile::RegisterFile;
use crate::trace::{TraceEvent, TraceSink};
use crate::units::alu::{Alu, AluOp};
use crate::units::bru::{Bru, BruOp};
use crate::units::dvu::{Dvu, DivOp};
use crate::units::lsu::Lsu;
use crate::units::mlu::{Mlu, MulOp};

fn alu_immediate_op(funct3: u32) -> AluOp {
    match funct3 {
        0 => AluOp::Add,
        1 => AluOp::Shl,
        2 => AluOp::Lt,
        3 => AluOp::LtU,
        4 => AluOp::Xor,
        5 => AluOp::Lshr,
        6 => AluOp::Or,
        _ => AluOp::And,
    }
}

fn bru_branch_op(funct3: u32) -> BruOp {
    match funct3 {
        0 => BruOp::Beq,
        1 => BruOp::Bne,
        4 => BruOp::Blt,
        5 => BruOp::Bge,
        6 => BruOp::Bltu,
        _ => BruOp::Bgeu,
    }
}

fn mlu_op(funct3: u32) -> MulOp {
    match funct3 {
        0 => MulOp::Mul,
        1 => MulOp::Mulh,
        2 => MulOp::Mulhsu,
        _ => MulOp::Mulhu,
    }
}

fn dvu_op(funct3: u32) -> DivOp {
    match funct3 {
        4 => DivOp::Div,
        5 => DivOp::Divu,
        6 => DivOp::Rem,
        _ => DivOp::Remu,
    }
}

fn system_op(word: u32) -> BruOp {
    match (word >> 20) & 0xFFF {
        FUNCT12_ECALL => BruOp::Ecall,
        FUNCT12_EBREAK => BruOp::Ebreak,
        FUNCT12_MRET => BruOp::Mret,
        FUNCT12_WFI => BruOp::Wfi,
        _ => BruOp::Fault,
    }
}

fn is_resource_constrained(op_type: OpType) -> bool {
    matches!(op_type, OpType::Mlu | OpType::Dvu | OpType::Lsu)
}

/// Borrowed handles to the units dispatch writes into, bundled the way
/// [`crate::units::lsu::Lsu`]'s own helpers take explicit parameters rather
/// than reaching through an owned scheduler reference.
pub struct DispatchUnits<'a> {
    pub alu: &'a mut Alu,
    pub bru: &'a mut Bru,
    pub mlu: &'a mut Mlu,
    pub dvu: &'a mut Dvu,
    pub lsu: &'a mut Lsu,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub hazard_stalls: u64,
    pub resource_stalls: u64,
    pub busy_stalls: u64,
    pub invalid_retired: u64,
    pub fence_retired: u64,
    pub vector_retired: u64,
}

pub struct Dispatch {
    pub name: String,
    lanes: usize,
    pub stats: DispatchStats,
    next_writer_id: u64,
    sink: Option<Arc<dyn TraceSink>>,
}

impl Dispatch {
    pub fn new(name: impl Into<String>, lanes: usize) -> Self {
        Self {
            name: name.into(),
            lanes: lanes.max(1),
            stats: DispatchStats::default(),
            next_writer_id: 0,
            sink: None,
        }
    }

    /// Registers a sink fed alongside this dispatcher's `tracing` emission.
    pub fn set_trace_sink(&mut self, sink: Arc<dyn TraceSink>) {
        self.sink = Some(sink);
    }

    /// Returns the number of instructions popped from `buffer` and
    /// dispatched (or retired as a no-op) this cycle.
    pub fn tick(
        &mut self,
        now: u64,
        buffer: &mut VecDeque<DecodedInstruction>,
        regfile: &mut RegisterFile,
        units: &mut DispatchUnits,
    ) -> usize {
        let mut resource_used = false;
        let mut branch_seen = false;
        let mut issued = 0usize;

        for lane in 0..self.lanes {
            let Some(instr) = buffer.front().copied() else { break };

            if branch_seen {
                break;
            }
            if lane != 0 && matches!(instr.op_type, OpType::Csr | OpType::Fence) {
                break;
            }

            match instr.op_type {
                OpType::Fence => {
                    buffer.pop_front();
                    self.stats.fence_retired += 1;
                    issued += 1;
                    continue;
                }
                OpType::Vector => {
                    buffer.pop_front();
                    self.stats.vector_retired += 1;
                    issued += 1;
                    continue;
                }
                OpType::Invalid => {
                    buffer.pop_front();
                    self.stats.invalid_retired += 1;
                    tracing::trace!(unit = %self.name, pc = instr.pc, "INVALID_INSTRUCTION");
                    if let Some(sink) = &self.sink {
                        sink.record(TraceEvent {
                            timestamp: now,
                            component: self.name.clone(),
                            kind: "INVALID_INSTRUCTION".to_string(),
                            message: format!("pc={:#x}", instr.pc),
                        });
                    }
                    issued += 1;
                    continue;
                }
                _ => {}
            }

            if (instr.rs1 != 0 && regfile.is_pending(instr.rs1))
                || (instr.rs2 != 0 && regfile.is_pending(instr.rs2))
            {
                self.stats.hazard_stalls += 1;
                break;
            }

            if is_resource_constrained(instr.op_type) && resource_used {
                self.stats.resource_stalls += 1;
                break;
            }

            let accepted = self.try_dispatch(now, &instr, regfile, units);
            if !accepted {
                self.stats.busy_stalls += 1;
                break;
            }

            if instr.op_type == OpType::Bru || instr.op_type == OpType::Csr {
                branch_seen = true;
            }
            if is_resource_constrained(instr.op_type) {
                resource_used = true;
            }

            buffer.pop_front();
            self.stats.dispatched += 1;
            issued += 1;
        }

        issued
    }

    fn try_dispatch(
        &mut self,
        now: u64,
        instr: &DecodedInstruction,
        regfile: &mut RegisterFile,
        units: &mut DispatchUnits,
    ) -> bool {
        let writer_id = self.next_writer_id;
        match instr.op_type {
            OpType::Alu => {
                if units.alu.is_full() {
                    return false;
                }
                let (src1, src2) = (regfile.read(instr.rs1), self.alu_src2(instr, regfile));
                let op = alu_immediate_op(instr.funct3);
                let cmd = AluCommand {
                    env: Envelope::new(now),
                    rd: instr.rd,
                    op,
                    src1,
                    src2,
                    src3: 0,
                };
                units.alu.accept(now, cmd).ok();
                self.commit_rd(instr.rd, regfile, writer_id);
                true
            }
            OpType::Bru => {
                let cmd = BruCommand {
                    env: Envelope::new(now),
                    pc: instr.pc,
                    target: instr.pc.wrapping_add(instr.imm as u32),
                    op: bru_branch_op(instr.funct3),
                    rs1_val: regfile.read(instr.rs1),
                    rs2_val: regfile.read(instr.rs2),
                    rd: instr.rd,
                };
                let op = match instr.opcode {
                    0x6F => BruOp::Jal,
                    0x67 => BruOp::Jalr,
                    _ => cmd.op,
                };
                let cmd = BruCommand { op, ..cmd };
                if units.bru.accept(cmd).is_err() {
                    return false;
                }
                self.commit_rd(instr.rd, regfile, writer_id);
                true
            }
            OpType::Csr => {
                let cmd = BruCommand {
                    env: Envelope::new(now),
                    pc: instr.pc,
                    target: instr.pc.wrapping_add(4),
                    op: system_op(instr.word),
                    rs1_val: regfile.read(instr.rs1),
                    rs2_val: 0,
                    rd: instr.rd,
                };
                if units.bru.accept(cmd).is_err() {
                    return false;
                }
                self.commit_rd(instr.rd, regfile, writer_id);
                true
            }
            OpType::Mlu => {
                if units.mlu.is_full() {
                    return false;
                }
                let cmd = MluCommand {
                    env: Envelope::new(now),
                    rd: instr.rd,
                    op: mlu_op(instr.funct3),
                    src1: regfile.read(instr.rs1),
                    src2: regfile.read(instr.rs2),
                };
                units.mlu.accept(cmd).ok();
                self.commit_rd(instr.rd, regfile, writer_id);
                true
            }
            OpType::Dvu => {
                if units.dvu.is_full() {
                    return false;
                }
                let cmd = DvuCommand {
                    env: Envelope::new(now),
                    rd: instr.rd,
                    op: dvu_op(instr.funct3),
                    dividend: regfile.read(instr.rs1) as i32,
                    divisor: regfile.read(instr.rs2) as i32,
                };
                units.dvu.accept(cmd).ok();
                self.commit_rd(instr.rd, regfile, writer_id);
                true
            }
            OpType::Lsu => {
                let op = if instr.opcode == 0x23 { LsuOp::Store } else { LsuOp::Load };
                let base = regfile.read(instr.rs1);
                let address = base.wrapping_add(instr.imm as u32) as u64;
                let req = LsuRequest {
                    env: Envelope::new(now),
                    rd: instr.rd,
                    op,
                    address,
                    data: regfile.read(instr.rs2),
                    stride: 0,
                    length: 1,
                    mask: 1,
                };
                if !units.lsu.submit(req) {
                    return false;
                }
                if op == LsuOp::Load {
                    self.commit_rd(instr.rd, regfile, writer_id);
                }
                true
            }
            OpType::Fence | OpType::Vector | OpType::Invalid => unreachable!("retired earlier"),
        }
    }

    fn alu_src2(&self, instr: &DecodedInstruction, regfile: &RegisterFile) -> u32 {
        if instr.opcode == 0x13 {
            instr.imm as u32
        } else {
            regfile.read(instr.rs2)
        }
    }

    fn commit_rd(&mut self, rd: u32, regfile: &mut RegisterFile, writer_id: u64) {
        if rd != 0 {
            regfile.set_pending(rd, writer_id);
            self.next_writer_id += 1;
        }
    }

    pub fn reset(&mut self) {
        self.stats = DispatchStats::default();
        self.next_writer_id = 0;
    }
}
