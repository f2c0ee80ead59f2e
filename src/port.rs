//! Single-slot typed holder attached to exactly one component.

use crate::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    In,
    Out,
}

#[derive(Debug)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    slot: Option<Packet>,
}

impl Port {
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            slot: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn has_data(&self) -> bool {
        self.slot.is_some()
    }

    /// Write a packet into the slot. Fails if the slot is already occupied;
    /// the caller is expected to retry next cycle.
    pub fn write(&mut self, packet: Packet) -> Result<(), Packet> {
        if self.slot.is_some() {
            return Err(packet);
        }
        self.slot = Some(packet);
        Ok(())
    }

    /// Read and consume the slot's contents.
    pub fn read(&mut self) -> Option<Packet> {
        self.slot.take()
    }

    /// Non-destructive look at the slot's contents.
    pub fn peek(&self) -> Option<&Packet> {
        self.slot.as_ref()
    }

    /// Force the slot's contents, overwriting whatever was there. Used by
    /// connections delivering a delayed packet directly into a destination
    /// component's port; the connection itself already gated on the
    /// destination being empty before scheduling the delivery.
    pub fn force_write(&mut self, packet: Packet) {
        self.slot = Some(packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Envelope, ScalarPacket};

    fn scalar(v: u32) -> Packet {
        Packet::Scalar(ScalarPacket { env: Envelope::new(0), value: v })
    }

    #[test]
    fn write_fails_when_occupied() {
        let mut p = Port::new("x", PortDirection::In);
        assert!(p.write(scalar(1)).is_ok());
        assert!(p.write(scalar(2)).is_err());
    }

    #[test]
    fn read_consumes_slot() {
        let mut p = Port::new("x", PortDirection::In);
        p.write(scalar(7)).unwrap();
        assert_eq!(p.read().unwrap().as_scalar(), Some(7));
        assert!(p.read().is_none());
    }
}
