// Write direction: AW/W latches and the Idle/WaitBoth/WriteReg/WriteResp machine

use serde::{Deserialize, Serialize};

use super::axi::{AxiLiteInputs, ByteEnable, Resp, RespBeat};
use super::BridgeConfig;
use crate::debug_flags;
use crate::regport::{BusRequest, BusResponse};

/// One captured channel value. `ready` to accept while empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLatch {
    value: u32,
    latched: bool,
}

impl ChannelLatch {
    #[inline]
    pub fn ready(&self) -> bool {
        !self.latched
    }

    #[inline]
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn capture(&mut self, value: u32) {
        self.value = value;
        self.latched = true;
    }

    pub fn clear(&mut self) {
        self.latched = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteState {
    Idle,
    WaitBoth,
    WriteReg,
    WriteResp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteChannel {
    state: WriteState,
    addr: ChannelLatch,
    data: ChannelLatch,
    resp: Resp,
}

impl Default for WriteChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteChannel {
    pub fn new() -> Self {
        Self {
            state: WriteState::Idle,
            addr: ChannelLatch::default(),
            data: ChannelLatch::default(),
            resp: Resp::Okay,
        }
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn addr_latch(&self) -> &ChannelLatch {
        &self.addr
    }

    pub fn data_latch(&self) -> &ChannelLatch {
        &self.data
    }

    pub fn aw_ready(&self) -> bool {
        self.addr.ready()
    }

    pub fn w_ready(&self) -> bool {
        self.data.ready()
    }

    pub fn b(&self) -> RespBeat {
        RespBeat {
            resp: self.resp,
            valid: self.state == WriteState::WriteResp,
        }
    }

    pub fn owns_bus(&self) -> bool {
        self.state == WriteState::WriteReg
    }

    /// Strobe stays up every `WriteReg` cycle until the bus is ready.
    pub fn bus_request(&self, config: &BridgeConfig) -> Option<BusRequest> {
        if self.owns_bus() {
            Some(BusRequest::write(
                config.word_address(self.addr.value()),
                self.data.value(),
            ))
        } else {
            None
        }
    }

    /// Rising edge. `bus_free` is false while the read side holds the bus.
    pub fn clock(&mut self, inputs: &AxiLiteInputs, bus: &BusResponse, bus_free: bool) {
        if inputs.aw.valid && self.addr.ready() {
            self.addr.capture(inputs.aw.addr);
            if debug_flags::trace_bridge() {
                log::debug!("bridge AW accepted {:#010X}", inputs.aw.addr);
            }
        }
        if inputs.w.valid && self.data.ready() {
            self.data.capture(inputs.w.data);
            if inputs.w.strb != ByteEnable::ALL {
                log::debug!(
                    "bridge W strobes {:04b} ignored; forwarding full word",
                    inputs.w.strb.bits()
                );
            }
            if debug_flags::trace_bridge() {
                log::debug!("bridge W accepted {:#010X}", inputs.w.data);
            }
        }

        let both = self.addr.is_latched() && self.data.is_latched();
        let next = match self.state {
            WriteState::Idle if both && bus_free => WriteState::WriteReg,
            WriteState::Idle if self.addr.is_latched() || self.data.is_latched() => {
                WriteState::WaitBoth
            }
            WriteState::Idle => WriteState::Idle,
            WriteState::WaitBoth if both && bus_free => WriteState::WriteReg,
            WriteState::WaitBoth => WriteState::WaitBoth,
            WriteState::WriteReg if bus.ready => {
                self.resp = Resp::Okay;
                WriteState::WriteResp
            }
            WriteState::WriteReg => WriteState::WriteReg,
            WriteState::WriteResp if inputs.b_ready => {
                self.addr.clear();
                self.data.clear();
                WriteState::Idle
            }
            WriteState::WriteResp => WriteState::WriteResp,
        };

        if next != self.state && debug_flags::trace_bridge() {
            log::debug!("bridge write {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }
}
