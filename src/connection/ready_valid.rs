use std::collections::VecDeque;

use crate::error::{ScoreError, ScoreResult};
use crate::packet::Packet;
use crate::port::Port;

fn signal_asserted(port: &Port) -> bool {
    matches!(port.peek().and_then(Packet::as_scalar), Some(v) if v != 0)
}

/// FIFO-buffered connection gated by bound `ready`/`valid` signal ports.
/// Phase ordering is strict: transfer (drain toward the destination) always
/// runs before enqueue (pull from the source) within a single `propagate`.
#[derive(Debug)]
pub struct ReadyValid {
    pub name: String,
    pub capacity: usize,
    pub latency: u64,
    buffer: VecDeque<Packet>,
    pending: VecDeque<(u64, Packet)>,
    pub transfers: u64,
    pub stalls: u64,
    pub enqueues: u64,
}

impl ReadyValid {
    pub fn new(name: impl Into<String>, capacity: usize, latency: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
            latency,
            buffer: VecDeque::new(),
            pending: VecDeque::new(),
            transfers: 0,
            stalls: 0,
            enqueues: 0,
        }
    }

    /// Checked once before the connection is allowed to run.
    pub fn start(&self, ready_bound: bool, valid_bound: bool) -> ScoreResult<()> {
        if !ready_bound || !valid_bound {
            return Err(ScoreError::Unbound(self.name.clone()));
        }
        Ok(())
    }

    pub fn buffer_occupancy(&self) -> usize {
        self.buffer.len()
    }

    pub fn propagate(
        &mut self,
        src: &mut Port,
        dst: &mut Port,
        ready: &Port,
        valid: &Port,
        now: u64,
    ) {
        // Phase A: transfer.
        while let Some(&(t, _)) = self.pending.front() {
            if t > now {
                break;
            }
            let (_, packet) = self.pending.pop_front().unwrap();
            if dst.is_empty() {
                dst.force_write(packet);
            }
        }
        if !self.buffer.is_empty() && dst.is_empty() && signal_asserted(ready) {
            let packet = self.buffer.pop_front().unwrap();
            if self.latency == 0 {
                dst.force_write(packet);
            } else {
                self.pending.push_back((now + self.latency, packet));
            }
            self.transfers += 1;
            tracing::trace!(conn = %self.name, %now, "CONN_TRANSFER");
        }

        // Phase B: enqueue.
        if src.has_data() && signal_asserted(valid) {
            if self.buffer.len() < self.capacity {
                let packet = src.read().unwrap();
                self.buffer.push_back(packet);
                self.enqueues += 1;
                tracing::trace!(conn = %self.name, %now, "CONN_ENQUEUE");
            } else {
                self.stalls += 1;
                tracing::trace!(conn = %self.name, %now, "CONN_BACK_PRESSURE");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Envelope, ScalarPacket};
    use crate::port::PortDirection;

    fn scalar(v: u32) -> Packet {
        Packet::Scalar(ScalarPacket { env: Envelope::new(0), value: v })
    }

    fn asserted() -> Port {
        let mut p = Port::new("sig", PortDirection::In);
        p.write(scalar(1)).unwrap();
        p
    }

    #[test]
    fn unbound_signals_fail_start() {
        let c = ReadyValid::new("rv", 2, 0);
        assert!(c.start(false, true).is_err());
        assert!(c.start(true, false).is_err());
        assert!(c.start(true, true).is_ok());
    }

    #[test]
    fn transfer_then_enqueue_same_cycle() {
        let mut src = Port::new("src", PortDirection::Out);
        let mut dst = Port::new("dst", PortDirection::In);
        let ready = asserted();
        let valid = asserted();
        let mut c = ReadyValid::new("rv", 2, 0);

        src.write(scalar(5)).unwrap();
        c.propagate(&mut src, &mut dst, &ready, &valid, 0);
        assert!(dst.is_empty());
        assert_eq!(c.buffer_occupancy(), 1);

        c.propagate(&mut src, &mut dst, &ready, &valid, 1);
        assert_eq!(dst.peek().unwrap().as_scalar(), Some(5));
        assert_eq!(c.transfers, 1);
    }

    #[test]
    fn overflow_stalls_without_dropping() {
        let mut src = Port::new("src", PortDirection::Out);
        let mut dst = Port::new("dst", PortDirection::In);
        let ready = Port::new("ready", PortDirection::In); // not asserted: no draining
        let valid = asserted();
        let mut c = ReadyValid::new("rv", 1, 0);

        src.write(scalar(1)).unwrap();
        c.propagate(&mut src, &mut dst, &ready, &valid, 0);
        assert_eq!(c.buffer_occupancy(), 1);

        src.write(scalar(2)).unwrap();
        c.propagate(&mut src, &mut dst, &ready, &valid, 1);
        assert_eq!(c.stalls, 1);
        assert!(src.has_data());
    }
}
