//! Requester models used to drive the bus in tests and scenarios.
//!
//! All masters are Moore machines: what they drive in a cycle depends only on
//! their state, and they look at the responder's outputs on the clock edge.

use std::collections::VecDeque;

use crate::bridge::axi::{AddrBeat, AxiLiteInputs, AxiLiteOutputs, ByteEnable, Resp, WriteBeat};
use crate::regport::{BusRequest, BusResponse};

/// One RegPort access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { address: u32 },
    Write { address: u32, data: u32 },
}

impl Access {
    pub fn address(&self) -> u32 {
        match *self {
            Access::Read { address } | Access::Write { address, .. } => address,
        }
    }

    fn data(&self) -> u32 {
        match *self {
            Access::Read { .. } => 0,
            Access::Write { data, .. } => data,
        }
    }
}

/// The two requester behaviours every responder must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterVariant {
    /// Strobe as soon as the address is presented; wait for `ready` before
    /// the next transaction.
    StrobeFirst,
    /// Present the address, wait for `ready`, then strobe.
    ReadyFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Present,
    Strobe,
    Hold { data_seen: bool },
}

/// Finished access with the data returned for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub access: Access,
    pub data: Option<u32>,
    /// Cycle count from first presentation to completion.
    pub latency: u64,
}

#[derive(Debug, Clone)]
pub struct RegPortMaster {
    variant: MasterVariant,
    queue: VecDeque<Access>,
    current: Option<Access>,
    phase: Phase,
    address: u32,
    read_data: u32,
    started: u64,
    cycle: u64,
    completed: Vec<Completion>,
}

impl RegPortMaster {
    pub fn new(variant: MasterVariant) -> Self {
        Self {
            variant,
            queue: VecDeque::new(),
            current: None,
            phase: Phase::Idle,
            address: 0,
            read_data: 0,
            started: 0,
            cycle: 0,
            completed: Vec::new(),
        }
    }

    pub fn variant(&self) -> MasterVariant {
        self.variant
    }

    pub fn push(&mut self, access: Access) {
        self.queue.push_back(access);
    }

    pub fn read(&mut self, address: u32) {
        self.push(Access::Read { address });
    }

    pub fn write(&mut self, address: u32, data: u32) {
        self.push(Access::Write { address, data });
    }

    pub fn is_done(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }

    pub fn completed(&self) -> &[Completion] {
        &self.completed
    }

    pub fn take_completed(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.completed)
    }

    /// What the master drives this cycle.
    pub fn request(&self) -> BusRequest {
        let Some(access) = self.current else {
            return BusRequest::idle(self.address);
        };
        let held = BusRequest {
            data: access.data(),
            ..BusRequest::idle(access.address())
        };
        match (self.phase, access) {
            (Phase::Strobe, Access::Read { .. }) => BusRequest {
                read_strobe: true,
                ..held
            },
            (Phase::Strobe, Access::Write { .. }) => BusRequest {
                write_strobe: true,
                ..held
            },
            _ => held,
        }
    }

    fn start_next(&mut self) {
        self.current = self.queue.pop_front();
        self.phase = match (self.current, self.variant) {
            (None, _) => Phase::Idle,
            (Some(_), MasterVariant::StrobeFirst) => Phase::Strobe,
            (Some(_), MasterVariant::ReadyFirst) => Phase::Present,
        };
        if let Some(a) = self.current {
            self.address = a.address();
            self.started = self.cycle + 1;
        }
    }

    fn finish(&mut self, access: Access, data: Option<u32>) {
        self.completed.push(Completion {
            access,
            data,
            latency: self.cycle + 1 - self.started,
        });
        self.start_next();
    }

    /// Rising edge with the combined response seen this cycle.
    pub fn clock(&mut self, resp: &BusResponse) {
        match (self.phase, self.current) {
            (Phase::Idle, _) | (_, None) => self.start_next(),
            (Phase::Present, Some(_)) => {
                if resp.ready {
                    self.phase = Phase::Strobe;
                }
            }
            (Phase::Strobe, Some(access @ Access::Write { .. })) => {
                if resp.ready {
                    self.finish(access, None);
                } else {
                    self.phase = Phase::Hold { data_seen: false };
                }
            }
            (Phase::Strobe, Some(Access::Read { .. })) => {
                self.phase = Phase::Hold { data_seen: false };
                if resp.data_valid {
                    self.read_data = resp.data;
                    self.phase = Phase::Hold { data_seen: true };
                }
            }
            (Phase::Hold { .. }, Some(access @ Access::Write { .. })) => {
                if resp.ready {
                    self.finish(access, None);
                }
            }
            (Phase::Hold { data_seen }, Some(access @ Access::Read { .. })) => {
                let mut seen = data_seen;
                if resp.data_valid && !seen {
                    self.read_data = resp.data;
                    seen = true;
                }
                // strobe-first masters also wait for ready before moving on
                let may_leave = match self.variant {
                    MasterVariant::StrobeFirst => resp.ready,
                    MasterVariant::ReadyFirst => true,
                };
                if seen && may_leave {
                    self.finish(access, Some(self.read_data));
                } else {
                    self.phase = Phase::Hold { data_seen: seen };
                }
            }
        }
        self.cycle += 1;
    }
}

/// Outcome of one AXI-Lite transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxiCompletion {
    Write { addr: u32, resp: Resp },
    Read { addr: u32, data: u32, resp: Resp },
}

#[derive(Debug, Clone, Copy)]
struct WriteJob {
    addr: u32,
    data: u32,
    strb: ByteEnable,
    // cycles to wait before raising each valid
    aw_delay: u32,
    w_delay: u32,
    aw_done: bool,
    w_done: bool,
    b_wait: u32,
}

#[derive(Debug, Clone, Copy)]
struct ReadJob {
    addr: u32,
    ar_done: bool,
    r_wait: u32,
}

/// AXI-Lite master with per-transaction channel skew and response
/// back-pressure. Read and write queues run independently.
#[derive(Debug, Clone, Default)]
pub struct AxiLiteMaster {
    writes: VecDeque<WriteJob>,
    reads: VecDeque<ReadJob>,
    /// Cycles to hold BREADY/RREADY low once the address phase is done.
    pub response_delay: u32,
    completed: Vec<AxiCompletion>,
}

impl AxiLiteMaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, addr: u32, data: u32) {
        self.write_skewed(addr, data, 0, 0);
    }

    /// Write whose address and data valids rise `aw_delay` and `w_delay`
    /// cycles after the transaction starts.
    pub fn write_skewed(&mut self, addr: u32, data: u32, aw_delay: u32, w_delay: u32) {
        self.write_masked(addr, data, ByteEnable::ALL, aw_delay, w_delay);
    }

    pub fn write_masked(&mut self, addr: u32, data: u32, strb: ByteEnable, aw_delay: u32, w_delay: u32) {
        self.writes.push_back(WriteJob {
            addr,
            data,
            strb,
            aw_delay,
            w_delay,
            aw_done: false,
            w_done: false,
            b_wait: self.response_delay,
        });
    }

    pub fn read(&mut self, addr: u32) {
        self.reads.push_back(ReadJob {
            addr,
            ar_done: false,
            r_wait: self.response_delay,
        });
    }

    pub fn is_done(&self) -> bool {
        self.writes.is_empty() && self.reads.is_empty()
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn completed(&self) -> &[AxiCompletion] {
        &self.completed
    }

    pub fn take_completed(&mut self) -> Vec<AxiCompletion> {
        std::mem::take(&mut self.completed)
    }

    pub fn inputs(&self) -> AxiLiteInputs {
        let mut inputs = AxiLiteInputs::default();
        if let Some(w) = self.writes.front() {
            inputs.aw = AddrBeat {
                addr: w.addr,
                valid: !w.aw_done && w.aw_delay == 0,
            };
            inputs.w = WriteBeat {
                data: w.data,
                strb: w.strb,
                valid: !w.w_done && w.w_delay == 0,
            };
            inputs.b_ready = w.aw_done && w.w_done && w.b_wait == 0;
        }
        if let Some(r) = self.reads.front() {
            inputs.ar = AddrBeat {
                addr: r.addr,
                valid: !r.ar_done,
            };
            inputs.r_ready = r.ar_done && r.r_wait == 0;
        }
        inputs
    }

    /// Rising edge with the bridge outputs seen this cycle.
    pub fn clock(&mut self, out: &AxiLiteOutputs) {
        let drive = self.inputs();

        if let Some(w) = self.writes.front_mut() {
            if drive.aw.valid && out.aw_ready {
                w.aw_done = true;
            } else if w.aw_delay > 0 {
                w.aw_delay -= 1;
            }
            if drive.w.valid && out.w_ready {
                w.w_done = true;
            } else if w.w_delay > 0 {
                w.w_delay -= 1;
            }
            if drive.b_ready && out.b.valid {
                let addr = w.addr;
                self.writes.pop_front();
                self.completed.push(AxiCompletion::Write {
                    addr,
                    resp: out.b.resp,
                });
            } else if out.b.valid && w.b_wait > 0 {
                w.b_wait -= 1;
            }
        }

        if let Some(r) = self.reads.front_mut() {
            if drive.ar.valid && out.ar_ready {
                r.ar_done = true;
            }
            if drive.r_ready && out.r.valid {
                let addr = r.addr;
                self.reads.pop_front();
                self.completed.push(AxiCompletion::Read {
                    addr,
                    data: out.r.data,
                    resp: out.r.resp,
                });
            } else if out.r.valid && r.r_wait > 0 {
                r.r_wait -= 1;
            }
        }
    }
}
