//! Passive checker for the RegPort timing contract.
//!
//! The monitor sees exactly what a logic analyser on the bus would see: the
//! request, the combined response and how many responders decoded the
//! address. It never drives anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::regport::{BusRequest, BusResponse, Strobe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Read and write strobe in the same cycle.
    BothStrobes,
    /// Requester moved the address before its transaction completed.
    AddressChangedWhileOutstanding { from: u32, to: u32 },
    /// Write data changed before the write completed.
    DataChangedWhileOutstanding { address: u32 },
    /// New strobe while a different or already-consumed one is in flight.
    StrobeWhileOutstanding { address: u32 },
    /// `ready` fell while the address was held and nothing was consumed.
    ReadyDropped { address: u32 },
    /// Non-zero data with `data_valid` low breaks OR-combining.
    DataWithoutValid { data: u32 },
    /// `data_valid` with no responder decoding the address.
    UndecodedResponse { address: u32 },
    /// More than one responder decodes the address.
    MultipleResponders { address: u32, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub cycle: u64,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {}: ", self.cycle)?;
        match self.kind {
            ViolationKind::BothStrobes => write!(f, "read and write strobe together"),
            ViolationKind::AddressChangedWhileOutstanding { from, to } => write!(
                f,
                "address changed {:#06X} -> {:#06X} with a transaction outstanding",
                from, to
            ),
            ViolationKind::DataChangedWhileOutstanding { address } => {
                write!(f, "write data changed before write to {:#06X} completed", address)
            }
            ViolationKind::StrobeWhileOutstanding { address } => {
                write!(f, "new strobe to {:#06X} before the previous one completed", address)
            }
            ViolationKind::ReadyDropped { address } => {
                write!(f, "ready dropped while {:#06X} was held", address)
            }
            ViolationKind::DataWithoutValid { data } => {
                write!(f, "data {:#010X} driven without data_valid", data)
            }
            ViolationKind::UndecodedResponse { address } => {
                write!(f, "data_valid for undecoded address {:#06X}", address)
            }
            ViolationKind::MultipleResponders { address, count } => {
                write!(f, "{} responders decode {:#06X}", count, address)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Outstanding {
    kind: Strobe,
    address: u32,
    data: u32,
    issued: u64,
    // a cycle with this strobe and ready high has passed
    consumed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMonitor {
    cycle: u64,
    last_address: Option<u32>,
    outstanding: Option<Outstanding>,
    // ready seen high at the held address with nothing consumed since
    ready_armed: bool,
    // strobe issued while not ready, not yet consumed
    unconsumed_strobe: bool,
    violations: Vec<Violation>,
    completed_reads: u64,
    completed_writes: u64,
}

impl ContractMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn completed_reads(&self) -> u64 {
        self.completed_reads
    }

    pub fn completed_writes(&self) -> u64 {
        self.completed_writes
    }

    /// Whether a strobed transaction has not yet completed.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    fn flag(&mut self, kind: ViolationKind) {
        let v = Violation {
            cycle: self.cycle,
            kind,
        };
        log::warn!("{}", v);
        self.violations.push(v);
    }

    /// Observe one cycle. Returns the violations raised in this cycle.
    pub fn observe(&mut self, req: &BusRequest, resp: &BusResponse, decoders: usize) -> &[Violation] {
        let first_new = self.violations.len();

        if !req.is_well_formed() {
            self.flag(ViolationKind::BothStrobes);
        }
        if decoders > 1 {
            self.flag(ViolationKind::MultipleResponders {
                address: req.address,
                count: decoders,
            });
        }
        if resp.data_valid && decoders == 0 {
            self.flag(ViolationKind::UndecodedResponse {
                address: req.address,
            });
        }
        if !resp.data_valid && resp.data != 0 {
            self.flag(ViolationKind::DataWithoutValid { data: resp.data });
        }

        self.check_hold(req);
        self.check_strobe(req, resp);
        self.check_ready(req, resp);
        self.check_completion(resp);

        self.last_address = Some(req.address);
        self.cycle += 1;
        &self.violations[first_new..]
    }

    fn check_hold(&mut self, req: &BusRequest) {
        let Some(o) = self.outstanding else {
            return;
        };
        if req.address != o.address {
            self.flag(ViolationKind::AddressChangedWhileOutstanding {
                from: o.address,
                to: req.address,
            });
            // the transaction is lost; stop tracking it
            self.outstanding = None;
        } else if o.kind == Strobe::Write && req.data != o.data {
            self.flag(ViolationKind::DataChangedWhileOutstanding { address: o.address });
        }
    }

    fn check_strobe(&mut self, req: &BusRequest, resp: &BusResponse) {
        let Some(kind) = Strobe::of(req) else {
            return;
        };
        match self.outstanding {
            Some(o) => {
                // a requester may hold its strobe until ready
                let same_data = kind == Strobe::Read || o.data == req.data;
                let held = !o.consumed && o.kind == kind && o.address == req.address && same_data;
                if !held {
                    self.flag(ViolationKind::StrobeWhileOutstanding {
                        address: req.address,
                    });
                    self.outstanding = Some(self.start(kind, req, resp));
                }
            }
            None => self.outstanding = Some(self.start(kind, req, resp)),
        }
    }

    fn start(&self, kind: Strobe, req: &BusRequest, resp: &BusResponse) -> Outstanding {
        Outstanding {
            kind,
            address: req.address,
            data: if kind == Strobe::Write { req.data } else { 0 },
            issued: self.cycle,
            consumed: resp.ready,
        }
    }

    fn check_ready(&mut self, req: &BusRequest, resp: &BusResponse) {
        if self.last_address != Some(req.address) {
            self.ready_armed = false;
            self.unconsumed_strobe = false;
        }
        if resp.ready {
            if req.strobed() || self.unconsumed_strobe {
                // consumption point; ready may fall from the next cycle on
                self.ready_armed = false;
                self.unconsumed_strobe = false;
            } else {
                self.ready_armed = true;
            }
        } else {
            if self.ready_armed {
                self.flag(ViolationKind::ReadyDropped {
                    address: req.address,
                });
                self.ready_armed = false;
            }
            if req.strobed() {
                self.unconsumed_strobe = true;
            }
        }
    }

    fn check_completion(&mut self, resp: &BusResponse) {
        let Some(mut o) = self.outstanding else {
            return;
        };
        if resp.ready {
            o.consumed = true;
        }
        match o.kind {
            Strobe::Write if resp.ready => {
                self.completed_writes += 1;
                self.outstanding = None;
            }
            Strobe::Read if resp.data_valid && o.issued < self.cycle => {
                self.completed_reads += 1;
                self.outstanding = None;
            }
            _ => self.outstanding = Some(o),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> BusResponse {
        BusResponse::IDLE
    }

    fn not_ready() -> BusResponse {
        BusResponse {
            ready: false,
            ..BusResponse::IDLE
        }
    }

    fn valid(data: u32) -> BusResponse {
        BusResponse {
            data,
            data_valid: true,
            ready: true,
        }
    }

    #[test]
    fn test_clean_write_and_read() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::write(1, 5), &ready(), 1);
        m.observe(&BusRequest::read(1), &ready(), 1);
        m.observe(&BusRequest::idle(1), &valid(5), 1);
        assert!(m.is_clean(), "{:?}", m.violations());
        assert_eq!(m.completed_writes(), 1);
        assert_eq!(m.completed_reads(), 1);
    }

    #[test]
    fn test_both_strobes_flagged() {
        let mut m = ContractMonitor::new();
        let req = BusRequest {
            read_strobe: true,
            ..BusRequest::write(1, 0)
        };
        let v = m.observe(&req, &ready(), 1);
        assert_eq!(v[0].kind, ViolationKind::BothStrobes);
    }

    #[test]
    fn test_address_must_hold_until_read_completes() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::read(1), &ready(), 1);
        let v = m.observe(&BusRequest::idle(2), &ready(), 1).to_vec();
        assert_eq!(
            v[0].kind,
            ViolationKind::AddressChangedWhileOutstanding { from: 1, to: 2 }
        );
    }

    #[test]
    fn test_write_data_must_hold_until_ready() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::write(1, 5), &not_ready(), 1);
        let v = m.observe(&BusRequest::idle(1), &not_ready(), 1).to_vec();
        assert_eq!(v[0].kind, ViolationKind::DataChangedWhileOutstanding { address: 1 });
    }

    #[test]
    fn test_held_write_strobe_is_legal() {
        let mut m = ContractMonitor::new();
        for _ in 0..3 {
            m.observe(&BusRequest::write(1, 5), &not_ready(), 1);
        }
        m.observe(&BusRequest::write(1, 5), &ready(), 1);
        assert!(m.is_clean(), "{:?}", m.violations());
        assert_eq!(m.completed_writes(), 1);
    }

    #[test]
    fn test_second_read_before_data_flagged() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::read(1), &ready(), 1);
        let v = m.observe(&BusRequest::read(1), &ready(), 1).to_vec();
        assert_eq!(v[0].kind, ViolationKind::StrobeWhileOutstanding { address: 1 });
    }

    #[test]
    fn test_ready_may_fall_only_after_consumption() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::idle(1), &ready(), 1);
        let v = m.observe(&BusRequest::idle(1), &not_ready(), 1).to_vec();
        assert_eq!(v[0].kind, ViolationKind::ReadyDropped { address: 1 });

        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::write(1, 0), &ready(), 1);
        m.observe(&BusRequest::idle(1), &not_ready(), 1);
        assert!(m.is_clean());
    }

    #[test]
    fn test_latched_strobe_consumed_when_ready_returns() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::read(1), &not_ready(), 1);
        m.observe(&BusRequest::idle(1), &not_ready(), 1);
        m.observe(&BusRequest::idle(1), &ready(), 1);
        // responder services the latched read, then waits again
        let r = BusResponse {
            data: 9,
            data_valid: true,
            ready: false,
        };
        m.observe(&BusRequest::idle(1), &r, 1);
        assert!(m.is_clean(), "{:?}", m.violations());
        assert_eq!(m.completed_reads(), 1);
    }

    #[test]
    fn test_address_change_rearms() {
        let mut m = ContractMonitor::new();
        m.observe(&BusRequest::idle(1), &ready(), 1);
        m.observe(&BusRequest::idle(2), &not_ready(), 1);
        assert!(m.is_clean());
    }

    #[test]
    fn test_decode_checks() {
        let mut m = ContractMonitor::new();
        let v = m.observe(&BusRequest::idle(7), &valid(1), 0).to_vec();
        assert_eq!(v[0].kind, ViolationKind::UndecodedResponse { address: 7 });

        let v = m.observe(&BusRequest::idle(7), &ready(), 2).to_vec();
        assert_eq!(v[0].kind, ViolationKind::MultipleResponders { address: 7, count: 2 });

        let dirty = BusResponse {
            data: 4,
            data_valid: false,
            ready: true,
        };
        let v = m.observe(&BusRequest::idle(7), &dirty, 1).to_vec();
        assert_eq!(v[0].kind, ViolationKind::DataWithoutValid { data: 4 });
    }
}
