// Read direction: AR latch and the Idle/ReadReg/ReadResp machine

use serde::{Deserialize, Serialize};

use super::axi::{AxiLiteInputs, ReadBeat, Resp};
use super::write::ChannelLatch;
use super::BridgeConfig;
use crate::debug_flags;
use crate::regport::{BusRequest, BusResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadState {
    Idle,
    ReadReg,
    ReadResp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadChannel {
    state: ReadState,
    addr: ChannelLatch,
    // one-cycle read strobe, set on the AR capture edge
    strobe: bool,
    data: u32,
    resp: Resp,
}

impl Default for ReadChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadChannel {
    pub fn new() -> Self {
        Self {
            state: ReadState::Idle,
            addr: ChannelLatch::default(),
            strobe: false,
            data: 0,
            resp: Resp::Okay,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    pub fn ar_ready(&self, bus_free: bool) -> bool {
        self.state == ReadState::Idle && bus_free
    }

    pub fn r(&self) -> ReadBeat {
        let valid = self.state == ReadState::ReadResp;
        ReadBeat {
            data: if valid { self.data } else { 0 },
            resp: self.resp,
            valid,
        }
    }

    pub fn owns_bus(&self) -> bool {
        self.state == ReadState::ReadReg
    }

    pub fn bus_request(&self, config: &BridgeConfig) -> Option<BusRequest> {
        if !self.owns_bus() {
            return None;
        }
        let address = config.word_address(self.addr.value());
        Some(if self.strobe {
            BusRequest::read(address)
        } else {
            BusRequest::idle(address)
        })
    }

    /// Rising edge. `bus_free` is false while the write side holds the bus.
    pub fn clock(&mut self, inputs: &AxiLiteInputs, bus: &BusResponse, bus_free: bool) {
        let next = match self.state {
            ReadState::Idle if inputs.ar.valid && self.ar_ready(bus_free) => {
                self.addr.capture(inputs.ar.addr);
                self.strobe = true;
                if debug_flags::trace_bridge() {
                    log::debug!("bridge AR accepted {:#010X}", inputs.ar.addr);
                }
                ReadState::ReadReg
            }
            ReadState::Idle => ReadState::Idle,
            ReadState::ReadReg => {
                self.strobe = false;
                if bus.data_valid {
                    self.data = bus.data;
                    self.resp = Resp::Okay;
                    ReadState::ReadResp
                } else {
                    ReadState::ReadReg
                }
            }
            ReadState::ReadResp if inputs.r_ready => {
                self.addr.clear();
                ReadState::Idle
            }
            ReadState::ReadResp => ReadState::ReadResp,
        };

        if next != self.state && debug_flags::trace_bridge() {
            log::debug!("bridge read {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }
}
