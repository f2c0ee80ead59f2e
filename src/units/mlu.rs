//! 32x32 -> 64-bit multiply unit: a uniform three-stage pipeline. The full
//! signed/unsigned product is computed the moment the command enters stage
//! 0 (it is pure function of the operands); stages 1 and 2 just carry it
//! along to model pipeline latency.

use std::sync::Arc;

use crate::packet::{Envelope, MluCommand, MluResult, Packet};
use crate::pipeline::Pipeline;
use crate::port::Port;
use crate::trace::{TraceEvent, TraceSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulOp {
    Mul,
    Mulh,
    Mulhu,
    Mulhsu,
}

#[derive(Debug, Clone, Copy)]
struct MluStageData {
    rd: u32,
    op: MulOp,
    product: u64,
}

fn compute_product(op: MulOp, src1: u32, src2: u32) -> u64 {
    match op {
        MulOp::Mul | MulOp::Mulh => ((src1 as i32 as i64) * (src2 as i32 as i64)) as u64,
        MulOp::Mulhu => (src1 as u64) * (src2 as u64),
        MulOp::Mulhsu => ((src1 as i32 as i64) * (src2 as u64 as i64)) as u64,
    }
}

fn select_result(op: MulOp, product: u64) -> u32 {
    match op {
        MulOp::Mul => product as u32,
        MulOp::Mulh | MulOp::Mulhu | MulOp::Mulhsu => (product >> 32) as u32,
    }
}

pub struct Mlu {
    pub name: String,
    pipeline: Pipeline<MluStageData>,
    pub requests_processed: u64,
    pub results_output: u64,
    sink: Option<Arc<dyn TraceSink>>,
}

impl Mlu {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipeline: Pipeline::new("mlu", 3),
            requests_processed: 0,
            results_output: 0,
            sink: None,
        }
    }

    /// Registers a sink fed alongside this unit's `tracing` emission.
    pub fn set_trace_sink(&mut self, sink: Arc<dyn TraceSink>) {
        self.sink = Some(sink);
    }

    pub fn is_full(&self) -> bool {
        self.pipeline.is_full()
    }

    pub fn accept(&mut self, cmd: MluCommand) -> Result<(), MluCommand> {
        let data = MluStageData {
            rd: cmd.rd,
            op: cmd.op,
            product: compute_product(cmd.op, cmd.src1, cmd.src2),
        };
        match self.pipeline.offer(data) {
            Ok(()) => {
                self.requests_processed += 1;
                Ok(())
            }
            Err(_) => Err(cmd),
        }
    }

    pub fn tick(&mut self, now: u64, output: &mut Port) {
        if let Some(d) = self.pipeline.tick(output.is_empty()) {
            self.results_output += 1;
            tracing::debug!(unit = %self.name, rd = d.rd, "MLU_OUTPUT");
            if let Some(sink) = &self.sink {
                sink.record(TraceEvent {
                    timestamp: now,
                    component: self.name.clone(),
                    kind: "MLU_OUTPUT".to_string(),
                    message: format!("rd=x{}", d.rd),
                });
            }
            output.force_write(Packet::MluResult(MluResult {
                env: Envelope::new(now),
                rd: d.rd,
                value: select_result(d.op, d.product),
            }));
        }
    }

    pub fn reset(&mut self) {
        self.pipeline.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortDirection;

    fn cmd(op: MulOp, a: u32, b: u32) -> MluCommand {
        MluCommand { env: Envelope::new(0), rd: 1, op, src1: a, src2: b }
    }

    fn drain(mlu: &mut Mlu, out: &mut Port) {
        for t in 0..mlu.pipeline.num_stages() as u64 {
            mlu.tick(t, out);
        }
    }

    #[test]
    fn mul_returns_low_word() {
        let mut mlu = Mlu::new("mlu");
        let mut out = Port::new("out", PortDirection::Out);
        mlu.accept(cmd(MulOp::Mul, 6, 7)).unwrap();
        drain(&mut mlu, &mut out);
        match out.read().unwrap() {
            Packet::MluResult(r) => assert_eq!(r.value, 42),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn mulhu_returns_high_word_of_unsigned_product() {
        let mut mlu = Mlu::new("mlu");
        let mut out = Port::new("out", PortDirection::Out);
        mlu.accept(cmd(MulOp::Mulhu, 0xFFFF_FFFF, 2)).unwrap();
        drain(&mut mlu, &mut out);
        match out.read().unwrap() {
            Packet::MluResult(r) => assert_eq!(r.value, 1),
            _ => panic!("wrong variant"),
        }
    }
}
