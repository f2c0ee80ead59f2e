//! Division/remainder unit: a three-stage pipeline where stage 1 uses a
//! stall predicate to hold a packet in place across multiple ticks while
//! an 8-bits-per-cycle restoring division runs to completion.

use crate::packet::{DvuCommand, DvuResult, Envelope, Packet};
use crate::pipeline::Pipeline;
use crate::port::Port;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivOp {
    Div,
    Divu,
    Rem,
    Remu,
}

const BITS_PER_CYCLE: u32 = 8;
const TOTAL_ITERATIONS: u32 = 4;

#[derive(Debug, Clone, Copy)]
struct DvuStageData {
    rd: u32,
    op: DivOp,
    dividend: u32,
    divisor: u32,
    dividend_neg: bool,
    divisor_neg: bool,
    div_by_zero: bool,
    quotient: u32,
    remainder: u32,
    iteration: u32,
    computation_done: bool,
    result: u32,
}

impl DvuStageData {
    fn latch(cmd: DvuCommand) -> Self {
        let div_by_zero = cmd.divisor == 0;
        let dividend_neg = cmd.dividend < 0;
        let divisor_neg = cmd.divisor < 0;
        let is_signed = matches!(cmd.op, DivOp::Div | DivOp::Rem);

        let (dividend, divisor) = if div_by_zero {
            (0, 0)
        } else if is_signed {
            (
                (if dividend_neg { -cmd.dividend } else { cmd.dividend }) as u32,
                (if divisor_neg { -cmd.divisor } else { cmd.divisor }) as u32,
            )
        } else {
            (cmd.dividend as u32, cmd.divisor as u32)
        };

        Self {
            rd: cmd.rd,
            op: cmd.op,
            dividend,
            divisor,
            dividend_neg,
            divisor_neg,
            div_by_zero,
            quotient: 0,
            remainder: 0,
            iteration: 0,
            computation_done: div_by_zero,
            result: 0,
        }
    }

    fn needs_more_iterations(&self) -> bool {
        !self.computation_done
    }

    fn iterate(mut self) -> Self {
        if self.computation_done {
            return self;
        }
        let start_bit = self.iteration * BITS_PER_CYCLE;
        for i in 0..BITS_PER_CYCLE {
            if start_bit + i >= 32 {
                break;
            }
            let bit_index = 31 - (start_bit + i);
            let bit = (self.dividend >> bit_index) & 1;
            let shifted = (self.remainder << 1) | bit;
            if shifted >= self.divisor {
                self.quotient = (self.quotient << 1) | 1;
                self.remainder = shifted - self.divisor;
            } else {
                self.quotient <<= 1;
                self.remainder = shifted;
            }
        }
        self.iteration += 1;
        if self.iteration >= TOTAL_ITERATIONS {
            self.computation_done = true;
        }
        self
    }

    fn finalize(mut self) -> Self {
        if self.div_by_zero {
            self.result = 0xFFFF_FFFF;
            return self;
        }
        let is_signed = matches!(self.op, DivOp::Div | DivOp::Rem);
        let return_quotient = matches!(self.op, DivOp::Div | DivOp::Divu);
        let mut raw = if return_quotient { self.quotient } else { self.remainder };
        if is_signed {
            let negate = if return_quotient {
                self.dividend_neg != self.divisor_neg
            } else {
                self.dividend_neg
            };
            if negate && raw != 0 {
                raw = (!raw).wrapping_add(1);
            }
        }
        self.result = raw;
        self
    }
}

pub struct Dvu {
    pub name: String,
    pipeline: Pipeline<DvuStageData>,
    pub requests_processed: u64,
    pub results_output: u64,
    pub div_by_zero_count: u64,
}

impl Dvu {
    pub fn new(name: impl Into<String>) -> Self {
        let mut pipeline = Pipeline::new("dvu", 3);
        pipeline.set_stage_transform(1, DvuStageData::iterate);
        pipeline.set_stage_stall_predicate(1, DvuStageData::needs_more_iterations);
        pipeline.set_stage_transform(2, DvuStageData::finalize);
        Self {
            name: name.into(),
            pipeline,
            requests_processed: 0,
            results_output: 0,
            div_by_zero_count: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.pipeline.is_full()
    }

    pub fn accept(&mut self, cmd: DvuCommand) -> Result<(), DvuCommand> {
        let div_by_zero = cmd.divisor == 0;
        let data = DvuStageData::latch(cmd);
        match self.pipeline.offer(data) {
            Ok(()) => {
                self.requests_processed += 1;
                if div_by_zero {
                    self.div_by_zero_count += 1;
                }
                Ok(())
            }
            Err(_) => Err(cmd),
        }
    }

    pub fn tick(&mut self, now: u64, output: &mut Port) {
        if let Some(d) = self.pipeline.tick(output.is_empty()) {
            self.results_output += 1;
            output.force_write(Packet::DvuResult(DvuResult {
                env: Envelope::new(now),
                rd: d.rd,
                value: d.result,
                div_by_zero: d.div_by_zero,
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

    fn cmd(op: DivOp, dividend: i32, divisor: i32) -> DvuCommand {
        DvuCommand { env: Envelope::new(0), rd: 5, op, dividend, divisor }
    }

    fn drain(dvu: &mut Dvu, out: &mut Port, cycles: u64) {
        for t in 0..cycles {
            dvu.tick(t, out);
        }
    }

    #[test]
    fn div_by_zero_scenario_from_spec() {
        let mut dvu = Dvu::new("dvu");
        let mut out = Port::new("out", PortDirection::Out);
        dvu.accept(cmd(DivOp::Div, 100, 0)).unwrap();
        drain(&mut dvu, &mut out, 5);
        match out.read().unwrap() {
            Packet::DvuResult(r) => assert_eq!(r.value, 0xFFFF_FFFF),
            _ => panic!("wrong variant"),
        }
        assert_eq!(dvu.div_by_zero_count, 1);
    }

    #[test]
    fn signed_division_rounds_toward_zero() {
        let mut dvu = Dvu::new("dvu");
        let mut out = Port::new("out", PortDirection::Out);
        dvu.accept(cmd(DivOp::Div, -7, 2)).unwrap();
        drain(&mut dvu, &mut out, 8);
        match out.read().unwrap() {
            Packet::DvuResult(r) => assert_eq!(r.value as i32, -3),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn remainder_takes_sign_of_dividend() {
        let mut dvu = Dvu::new("dvu");
        let mut out = Port::new("out", PortDirection::Out);
        dvu.accept(cmd(DivOp::Rem, -7, 2)).unwrap();
        drain(&mut dvu, &mut out, 8);
        match out.read().unwrap() {
            Packet::DvuResult(r) => assert_eq!(r.value as i32, -1),
            _ => panic!("wrong variant"),
        }
    }
}
