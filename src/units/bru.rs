//! Branch/jump resolution unit: a uniform three-stage pipeline (decode,
//! evaluate, emit) shared by every op in its set.

use crate::packet::{BruCommand, BruResult, Envelope, Packet};
use crate::pipeline::Pipeline;
use crate::port::Port;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BruOp {
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Jal,
    Jalr,
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Fault,
}

fn is_system_exception(op: BruOp) -> bool {
    matches!(op, BruOp::Ecall | BruOp::Ebreak | BruOp::Mret | BruOp::Wfi | BruOp::Fault)
}

#[derive(Debug, Clone, Copy)]
struct BruStageData {
    cmd: BruCommand,
    eq: bool,
    lt_signed: bool,
    lt_unsigned: bool,
    taken: bool,
    target: u32,
    link_valid: bool,
    link_data: u32,
}

impl BruStageData {
    fn latch(cmd: BruCommand) -> Self {
        Self {
            cmd,
            eq: false,
            lt_signed: false,
            lt_unsigned: false,
            taken: false,
            target: 0,
            link_valid: false,
            link_data: 0,
        }
    }

    fn evaluate(mut self) -> Self {
        let c = &self.cmd;
        self.eq = c.rs1_val == c.rs2_val;
        self.lt_signed = (c.rs1_val as i32) < (c.rs2_val as i32);
        self.lt_unsigned = c.rs1_val < c.rs2_val;

        self.taken = match c.op {
            BruOp::Beq => self.eq,
            BruOp::Bne => !self.eq,
            BruOp::Blt => self.lt_signed,
            BruOp::Bge => !self.lt_signed,
            BruOp::Bltu => self.lt_unsigned,
            BruOp::Bgeu => !self.lt_unsigned,
            BruOp::Jal | BruOp::Jalr => true,
            BruOp::Ecall | BruOp::Ebreak | BruOp::Mret | BruOp::Wfi | BruOp::Fault => true,
        };

        self.target = match c.op {
            BruOp::Jalr => c.rs1_val & !1,
            BruOp::Ecall | BruOp::Ebreak | BruOp::Wfi => c.pc.wrapping_add(4),
            BruOp::Mret => c.target,
            _ => c.target,
        };

        self.link_valid = matches!(c.op, BruOp::Jal | BruOp::Jalr) && c.rd != 0;
        self.link_data = c.pc.wrapping_add(4);
        self
    }
}

pub struct Bru {
    pub name: String,
    pipeline: Pipeline<BruStageData>,
    pub resolved: u64,
    pub taken: u64,
    pub mispredicted: u64,
    pub system_exceptions: u64,
}

impl Bru {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut pipeline = Pipeline::new(name.clone(), 3);
        pipeline.set_stage_transform(0, BruStageData::latch_passthrough);
        pipeline.set_stage_transform(1, |d| d.evaluate());
        Self {
            name,
            pipeline,
            resolved: 0,
            taken: 0,
            mispredicted: 0,
            system_exceptions: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.pipeline.is_full()
    }

    pub fn accept(&mut self, cmd: BruCommand) -> Result<(), BruCommand> {
        self.pipeline.offer(BruStageData::latch(cmd)).map_err(|d| d.cmd)
    }

    pub fn tick(&mut self, now: u64, output: &mut Port) {
        let produced = self.pipeline.tick(output.is_empty());
        if let Some(d) = produced {
            self.resolved += 1;
            if d.taken {
                self.taken += 1;
            }
            if is_system_exception(d.cmd.op) {
                self.system_exceptions += 1;
            }
            output.force_write(Packet::BruResult(BruResult {
                env: Envelope::new(now),
                rd: d.cmd.rd,
                taken: d.taken,
                target: d.target,
                link_valid: d.link_valid,
                link_data: d.link_data,
            }));
        }
    }

    pub fn reset(&mut self) {
        self.pipeline.reset();
    }
}

impl BruStageData {
    fn latch_passthrough(self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortDirection;

    fn command(op: BruOp, pc: u32, target: u32, rs1: u32, rs2: u32, rd: u32) -> BruCommand {
        BruCommand {
            env: Envelope::new(0),
            pc,
            target,
            op,
            rs1_val: rs1,
            rs2_val: rs2,
            rd,
        }
    }

    fn drain(bru: &mut Bru, out: &mut Port) {
        for t in 0..bru.pipeline.num_stages() as u64 {
            bru.tick(t, out);
        }
    }

    #[test]
    fn branch_taken_scenario_from_spec() {
        let mut bru = Bru::new("bru");
        let mut out = Port::new("out", PortDirection::Out);
        bru.accept(command(BruOp::Beq, 0x0, 0x100, 7, 7, 0)).unwrap();
        drain(&mut bru, &mut out);
        match out.read().unwrap() {
            Packet::BruResult(r) => {
                assert!(r.taken);
                assert_eq!(r.target, 0x100);
                assert!(!r.link_valid);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn jalr_alignment_scenario_from_spec() {
        let mut bru = Bru::new("bru");
        let mut out = Port::new("out", PortDirection::Out);
        bru.accept(command(BruOp::Jalr, 0x200, 0, 0x501, 0, 1)).unwrap();
        drain(&mut bru, &mut out);
        match out.read().unwrap() {
            Packet::BruResult(r) => {
                assert!(r.taken);
                assert_eq!(r.target, 0x500);
                assert!(r.link_valid);
                assert_eq!(r.link_data, 0x204);
            }
            _ => panic!("wrong variant"),
        }
    }
}
