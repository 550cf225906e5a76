//! AXI-Lite to RegPort bridge.
//!
//! The AXI side has independent address/data arrival and explicit response
//! acceptance; the RegPort side has single-cycle strobes and one transaction
//! in flight. Reads and writes run separate state machines. They only meet
//! at the bus: whichever direction is in its bus phase owns the one address
//! bus, and the other may not start its bus phase until it is released.
//!
//! The bridge only ever answers `Resp::Okay`. Nothing on the RegPort side
//! can report a failure, so writes to undecoded or read-only addresses
//! complete normally.

pub mod axi;
pub mod read;
pub mod write;

use serde::{Deserialize, Serialize};

use crate::regport::{address_mask, BusRequest, BusResponse, WORD_BYTES};
use axi::{AxiLiteInputs, AxiLiteOutputs};
use read::ReadChannel;
use write::WriteChannel;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Width of the RegPort word address in bits.
    pub address_width: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { address_width: 16 }
    }
}

impl BridgeConfig {
    /// AXI byte address to RegPort word address. Sub-word bits are dropped.
    pub fn word_address(&self, byte_address: u32) -> u32 {
        (byte_address / WORD_BYTES) & address_mask(self.address_width)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxiLiteBridge {
    config: BridgeConfig,
    write: WriteChannel,
    read: ReadChannel,
    // address left on the bus when neither side owns it
    idle_address: u32,
}

impl AxiLiteBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            write: WriteChannel::new(),
            read: ReadChannel::new(),
            idle_address: 0,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn write_channel(&self) -> &WriteChannel {
        &self.write
    }

    pub fn read_channel(&self) -> &ReadChannel {
        &self.read
    }

    pub fn is_idle(&self) -> bool {
        self.write.state() == write::WriteState::Idle && self.read.state() == read::ReadState::Idle
    }

    /// AXI outputs for the current cycle. Depend on state only.
    pub fn outputs(&self) -> AxiLiteOutputs {
        AxiLiteOutputs {
            aw_ready: self.write.aw_ready(),
            w_ready: self.write.w_ready(),
            b: self.write.b(),
            ar_ready: self.read.ar_ready(!self.write.owns_bus()),
            r: self.read.r(),
        }
    }

    /// RegPort request for the current cycle.
    pub fn bus_request(&self) -> BusRequest {
        self.write
            .bus_request(&self.config)
            .or_else(|| self.read.bus_request(&self.config))
            .unwrap_or_else(|| BusRequest::idle(self.idle_address))
    }

    /// Rising edge with this cycle's AXI inputs and combined bus response.
    pub fn clock(&mut self, inputs: &AxiLiteInputs, bus: &BusResponse) {
        let presented = self.bus_request();

        self.read.clock(inputs, bus, !self.write.owns_bus());
        // a read that just took the bus keeps it; the write waits
        let read_holds_bus = self.read.owns_bus();
        self.write.clock(inputs, bus, !read_holds_bus);

        debug_assert!(!(self.read.owns_bus() && self.write.owns_bus()));
        self.idle_address = presented.address;
    }
}
