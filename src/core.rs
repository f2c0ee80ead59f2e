//! `SCore`: wires the functional units, the register file, and decode/
//! dispatch together behind the scheduler, and exposes the host-embedding
//! surface (`inject`, `inject_data`, `read_register`, `initialize`, `reset`,
//! `print_statistics`) a host driving the core needs.
//!
//! Each functional unit already takes its ports as explicit call
//! parameters rather than owning them (mirroring how
//! [`crate::units::lsu::Lsu`] and the connection types work), so `SCore`
//! owns one output `Port` per unit plus a same-cycle-readable [`Wire`] per
//! unit (`dst = None`, the "CommonDataBus" mode) that a writeback step
//! drains into the register file every cycle.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::component::TickingComponent;
use crate::config::Config;
use crate::connection::Wire;
use crate::decode::{decode, DecodedInstruction};
use crate::dispatch::{Dispatch, DispatchUnits};
use crate::event::{Scheduler, PRIORITY_PROPAGATE, PRIORITY_TICK};
use crate::packet::Packet;
use crate::port::{Port, PortDirection};
use crate::regfile::RegisterFile;
use crate::trace::TraceSink;
use crate::units::alu::Alu;
use crate::units::bru::Bru;
use crate::units::dvu::Dvu;
use crate::units::lsu::Lsu;
use crate::units::mlu::Mlu;

#[derive(Debug, Clone, Copy)]
pub enum Action {
    Propagate,
    Tick,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Statistics {
    pub cycles: u64,
    pub instructions_dispatched: u64,
    pub instructions_retired_invalid: u64,
}

pub struct SCore {
    pub name: String,
    config: Config,
    scheduler: Scheduler<Action>,

    alu: Alu,
    bru: Bru,
    mlu: Mlu,
    dvu: Dvu,
    lsu: Lsu,

    alu_out: Port,
    bru_out: Port,
    mlu_out: Port,
    dvu_out: Port,
    lsu_out: Port,
    lsu_req_in: Port,

    alu_wire: Wire,
    bru_wire: Wire,
    mlu_wire: Wire,
    dvu_wire: Wire,
    lsu_wire: Wire,

    regfile: RegisterFile,
    dispatch: Dispatch,

    fetch_buffer: VecDeque<(u32, u32)>,
    decode_buffer: VecDeque<DecodedInstruction>,

    pub stats: Statistics,
}

impl SCore {
    pub fn new(name: impl Into<String>, config: Config) -> Self {
        Self {
            alu: Alu::new("alu"),
            bru: Bru::new("bru"),
            mlu: Mlu::new("mlu"),
            dvu: Dvu::new("dvu"),
            lsu: Lsu::new("lsu", config.num_memory_banks, config.buffer_size),
            alu_out: Port::new("alu_out", PortDirection::Out),
            bru_out: Port::new("bru_out", PortDirection::Out),
            mlu_out: Port::new("mlu_out", PortDirection::Out),
            dvu_out: Port::new("dvu_out", PortDirection::Out),
            lsu_out: Port::new("lsu_out", PortDirection::Out),
            lsu_req_in: Port::new("lsu_req_in", PortDirection::In),
            alu_wire: Wire::new("alu_cdb", config.connection_latency),
            bru_wire: Wire::new("bru_cdb", config.connection_latency),
            mlu_wire: Wire::new("mlu_cdb", config.connection_latency),
            dvu_wire: Wire::new("dvu_cdb", config.connection_latency),
            lsu_wire: Wire::new("lsu_cdb", config.connection_latency),
            regfile: RegisterFile::new(config.num_registers, config.use_regfile_forwarding),
            dispatch: Dispatch::new("dispatch", config.instruction_lanes),
            fetch_buffer: VecDeque::new(),
            decode_buffer: VecDeque::new(),
            stats: Statistics::default(),
            config,
            scheduler: Scheduler::new(),
            name: name.into(),
        }
    }

    /// Starts the recurring propagate/tick events at `config.start_time`.
    pub fn initialize(&mut self) {
        let start = self.config.start_time;
        self.scheduler.reset();
        self.scheduler
            .schedule_at(start, PRIORITY_PROPAGATE, "propagate", Action::Propagate)
            .expect("start_time must not be in the past");
        self.scheduler
            .schedule_at(start, PRIORITY_TICK, "tick", Action::Tick)
            .expect("start_time must not be in the past");
    }

    /// Appends a raw fetch word at `pc` to the tail of the fetch queue. The
    /// host is responsible for ordering calls the way a program counter
    /// would walk the image; this core has no fetch-address generation of
    /// its own (§ Non-goals: no branch prediction, no speculative fetch).
    pub fn inject(&mut self, pc: u32, word: u32) {
        self.fetch_buffer.push_back((pc, word));
    }

    pub fn inject_data(&mut self, addr: u64, word: u32) {
        self.lsu.preload(addr, word).expect("inject_data address must be word-aligned");
    }

    /// Registers a sink fed alongside every `tracing` event this core's
    /// CDB wires, MLU, LSU, and dispatcher already emit during `tick`.
    pub fn set_trace_sink(&mut self, sink: Arc<dyn TraceSink>) {
        self.alu_wire.set_trace_sink(sink.clone());
        self.bru_wire.set_trace_sink(sink.clone());
        self.mlu_wire.set_trace_sink(sink.clone());
        self.dvu_wire.set_trace_sink(sink.clone());
        self.lsu_wire.set_trace_sink(sink.clone());
        self.mlu.set_trace_sink(sink.clone());
        self.lsu.set_trace_sink(sink.clone());
        self.dispatch.set_trace_sink(sink);
    }

    pub fn read_register(&self, reg: u32) -> u32 {
        self.regfile.read_register(reg)
    }

    pub fn write_register(&mut self, reg: u32, value: u32) {
        self.regfile.write_register(reg, value);
    }

    pub fn current_time(&self) -> u64 {
        self.scheduler.current_time()
    }

    pub fn fetch_queue_len(&self) -> usize {
        self.fetch_buffer.len()
    }

    pub fn decode_queue_len(&self) -> usize {
        self.decode_buffer.len()
    }

    /// Runs the scheduler up to and including time `t`.
    pub fn run_until(&mut self, t: u64) {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        scheduler.run_until(t, |sched, ev| self.dispatch_action(sched, ev.payload, ev.time));
        self.scheduler = scheduler;
    }

    /// Runs for `n` cycles starting from the current time.
    pub fn run_cycles(&mut self, n: u64) {
        let target = self.scheduler.current_time() + n;
        self.run_until(target);
    }

    fn dispatch_action(&mut self, sched: &mut Scheduler<Action>, action: Action, now: u64) {
        match action {
            Action::Propagate => {
                self.propagate(now);
                sched
                    .schedule_at(now + 1, PRIORITY_PROPAGATE, "propagate", Action::Propagate)
                    .ok();
            }
            Action::Tick => {
                self.tick(now);
                sched.schedule_at(now + 1, PRIORITY_TICK, "tick", Action::Tick).ok();
            }
        }
    }

    /// Drains each unit's output port into its dedicated CDB wire. Runs at
    /// `PRIORITY_PROPAGATE` (before `Tick`) so the values a unit produced
    /// last cycle are ready for this cycle's writeback.
    fn propagate(&mut self, now: u64) {
        self.alu_wire.propagate(&mut self.alu_out, None, now);
        self.bru_wire.propagate(&mut self.bru_out, None, now);
        self.mlu_wire.propagate(&mut self.mlu_out, None, now);
        self.dvu_wire.propagate(&mut self.dvu_out, None, now);
        self.lsu_wire.propagate(&mut self.lsu_out, None, now);
    }

    fn writeback(&mut self) {
        if let Some(Packet::AluResult(r)) = self.alu_wire.read() {
            self.regfile.write(r.rd, r.value, false);
        }
        if let Some(Packet::BruResult(r)) = self.bru_wire.read() {
            if r.link_valid {
                self.regfile.write(r.rd, r.link_data, false);
            }
        }
        if let Some(Packet::MluResult(r)) = self.mlu_wire.read() {
            self.regfile.write(r.rd, r.value, false);
        }
        if let Some(Packet::DvuResult(r)) = self.dvu_wire.read() {
            self.regfile.write(r.rd, r.value, false);
        }
        if let Some(Packet::LsuResponse(r)) = self.lsu_wire.read() {
            self.regfile.write(r.rd, r.data, !r.success);
        }
    }

    fn run_fetch_decode(&mut self) {
        for _ in 0..self.config.instruction_lanes {
            let Some((pc, word)) = self.fetch_buffer.pop_front() else { break };
            self.decode_buffer.push_back(decode(pc, word));
        }
    }

    fn do_tick(&mut self, now: u64) {
        self.writeback();

        if now % self.config.alu_period.max(1) == 0 {
            self.alu.tick(now, &mut self.alu_out);
        }
        if now % self.config.bru_period.max(1) == 0 {
            self.bru.tick(now, &mut self.bru_out);
        }
        if now % self.config.mlu_period.max(1) == 0 {
            self.mlu.tick(now, &mut self.mlu_out);
        }
        if now % self.config.dvu_period.max(1) == 0 {
            self.dvu.tick(now, &mut self.dvu_out);
        }
        if now % self.config.lsu_period.max(1) == 0 {
            self.lsu.tick(now, &mut self.lsu_req_in, &mut self.lsu_out);
        }

        {
            let mut units = DispatchUnits {
                alu: &mut self.alu,
                bru: &mut self.bru,
                mlu: &mut self.mlu,
                dvu: &mut self.dvu,
                lsu: &mut self.lsu,
            };
            let issued = self.dispatch.tick(now, &mut self.decode_buffer, &mut self.regfile, &mut units);
            self.stats.instructions_dispatched += issued as u64;
        }

        self.run_fetch_decode();
        if now % self.config.regfile_period.max(1) == 0 {
            self.regfile.end_cycle();
        }
        self.stats.cycles += 1;
        self.stats.instructions_retired_invalid = self.dispatch.stats.invalid_retired;
    }

    pub fn reset(&mut self) {
        self.alu.reset();
        self.bru.reset();
        self.mlu.reset();
        self.dvu.reset();
        self.lsu.reset();
        self.regfile.reset();
        self.dispatch.reset();
        self.fetch_buffer.clear();
        self.decode_buffer.clear();
        self.stats = Statistics::default();
        self.scheduler.reset();
    }

    pub fn print_statistics(&self) {
        tracing::info!(
            core = %self.name,
            cycles = self.stats.cycles,
            dispatched = self.stats.instructions_dispatched,
            invalid_retired = self.stats.instructions_retired_invalid,
            alu_results = self.alu.results_emitted,
            bru_resolved = self.bru.resolved,
            mlu_results = self.mlu.results_output,
            dvu_results = self.dvu.results_output,
            lsu_bank_conflicts = self.lsu.bank_conflict_stalls,
            "statistics"
        );
    }
}

impl TickingComponent for SCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> u64 {
        1
    }

    fn tick(&mut self, now: u64) {
        self.do_tick(now);
    }

    fn reset(&mut self) {
        SCore::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::MemorySink;

    fn core() -> SCore {
        let mut c = SCore::new("core", Config::default());
        c.initialize();
        c
    }

    #[test]
    fn add_immediate_then_register_add_scenario() {
        let mut c = core();
        c.inject(0, 0x00A00093); // ADDI x1, x0, 10
        c.inject(4, 0x00500113); // ADDI x2, x0, 5
        c.inject(8, 0x002081B3); // ADD x3, x1, x2
        c.run_cycles(20);
        assert_eq!(c.read_register(1), 10);
        assert_eq!(c.read_register(2), 5);
        assert_eq!(c.read_register(3), 15);
    }

    #[test]
    fn branch_taken_updates_no_register_but_resolves() {
        let mut c = core();
        c.inject(0, 0x00063063); // BEQ x12, x0, +0
        c.run_cycles(10);
        assert_eq!(c.bru.resolved, 1);
    }

    #[test]
    fn division_by_zero_yields_all_ones() {
        let mut c = core();
        c.inject(0, 0x00A00093); // ADDI x1, x0, 10
        c.inject(4, 0x0200C1B3); // DIV x3, x1, x0 (divisor = x0 = 0)
        c.run_cycles(20);
        assert_eq!(c.read_register(3), 0xFFFF_FFFF);
    }

    #[test]
    fn register_zero_stays_zero_across_writeback() {
        let mut c = core();
        c.inject(0, 0x00A00013); // ADDI x0, x0, 10 (rd = x0)
        c.run_cycles(10);
        assert_eq!(c.read_register(0), 0);
    }

    #[test]
    fn invalid_opcode_is_retired_without_side_effects() {
        let mut c = core();
        c.inject(0, 0x7F); // unmapped opcode low bits all set
        c.run_cycles(5);
        assert_eq!(c.stats.instructions_retired_invalid, 1);
    }

    #[test]
    fn mac_program_accumulates_through_mlu_and_alu() {
        // 10*5 + 20*6 + 30*7 + 40*8 = 700, computed as a MUL per term
        // (MLU) followed by a pairwise-sum tree (ALU).
        let mut c = core();
        c.inject(0, 0x00A00093); // ADDI x1, x0, 10
        c.inject(4, 0x00500113); // ADDI x2, x0, 5
        c.inject(8, 0x01400193); // ADDI x3, x0, 20
        c.inject(12, 0x00600213); // ADDI x4, x0, 6
        c.inject(16, 0x01E00293); // ADDI x5, x0, 30
        c.inject(20, 0x00700313); // ADDI x6, x0, 7
        c.inject(24, 0x02800393); // ADDI x7, x0, 40
        c.inject(28, 0x00800413); // ADDI x8, x0, 8
        c.inject(32, 0x022084B3); // MUL x9, x1, x2   (10*5)
        c.inject(36, 0x02418533); // MUL x10, x3, x4  (20*6)
        c.inject(40, 0x026285B3); // MUL x11, x5, x6  (30*7)
        c.inject(44, 0x02838633); // MUL x12, x7, x8  (40*8)
        c.inject(48, 0x00A486B3); // ADD x13, x9, x10
        c.inject(52, 0x00C58733); // ADD x14, x11, x12
        c.inject(56, 0x00E687B3); // ADD x15, x13, x14
        c.run_cycles(80);

        assert_eq!(c.read_register(9), 50);
        assert_eq!(c.read_register(10), 120);
        assert_eq!(c.read_register(11), 210);
        assert_eq!(c.read_register(12), 320);
        assert_eq!(c.read_register(15), 700);
    }

    #[test]
    fn registered_trace_sink_observes_real_dispatch_activity() {
        let mut c = core();
        let sink = Arc::new(MemorySink::new());
        c.set_trace_sink(sink.clone());
        c.inject(0, 0x7F); // unmapped opcode, retired as INVALID_INSTRUCTION
        c.run_cycles(5);
        assert!(sink.events_of_kind("INVALID_INSTRUCTION") >= 1);
    }
}
