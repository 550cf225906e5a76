// Shared host/local register on the RegPort bus
//
// One 32-bit cell written from two sides: the host through the bus and a
// local writer (hardware side). The local writer always wins a same-cycle
// conflict. In ack mode the register drops `ready` after every serviced
// strobe until the local side acknowledges.

pub mod bank;

use serde::{Deserialize, Serialize};

use crate::debug_flags;
use crate::regport::{BusEvent, BusRequest, BusResponse, EventCounts, Responder, Strobe};

#[cfg(test)]
mod tests;

/// How the register signals `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckMode {
    /// `ready` is always high.
    Immediate,
    /// `ready` drops after a serviced strobe and comes back the cycle after
    /// the local side pulses `ack`.
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Word address on the bus.
    pub address: u32,
    /// Value loaded on reset.
    pub default: u32,
    pub read_only: bool,
    pub ack_mode: AckMode,
    /// Constant registers have nothing on the local side driving them.
    pub local_writer: bool,
}

impl RegisterConfig {
    pub fn read_write(address: u32, default: u32) -> Self {
        Self {
            address,
            default,
            read_only: false,
            ack_mode: AckMode::Immediate,
            local_writer: true,
        }
    }

    pub fn read_only(address: u32, default: u32) -> Self {
        Self {
            read_only: true,
            ..Self::read_write(address, default)
        }
    }

    /// A read-only register nobody can change: a constant.
    pub fn constant(address: u32, value: u32) -> Self {
        Self {
            local_writer: false,
            ..Self::read_only(address, value)
        }
    }

    pub fn with_ack(mut self) -> Self {
        self.ack_mode = AckMode::Required;
        self
    }
}

/// Local-side inputs for one clock edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInputs {
    /// Local write enable plus value.
    pub write: Option<u32>,
    /// Acknowledge pulse (ack mode only).
    pub ack: bool,
    pub reset: bool,
}

/// Registered outputs, rebuilt from defaults on every edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOutputs {
    pub data: u32,
    pub data_valid: bool,
    /// One-cycle pulse after every bus write to this register.
    pub local_write_request: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedRegister {
    config: RegisterConfig,
    value: u32,
    outputs: RegisterOutputs,
    // ack mode: a serviced strobe is waiting for the local acknowledgment
    waiting_ack: bool,
    // strobe that arrived while not ready
    pending: Option<Strobe>,
    // staged for the next edge, cleared after it
    local: LocalInputs,
    events: EventCounts,
}

impl SharedRegister {
    pub fn new(config: RegisterConfig) -> Self {
        Self {
            config,
            value: config.default,
            outputs: RegisterOutputs::default(),
            waiting_ack: false,
            pending: None,
            local: LocalInputs::default(),
            events: EventCounts::default(),
        }
    }

    pub fn config(&self) -> &RegisterConfig {
        &self.config
    }

    /// Stored value as seen by the local side.
    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn outputs(&self) -> RegisterOutputs {
        self.outputs
    }

    pub fn local_write_request(&self) -> bool {
        self.outputs.local_write_request
    }

    pub fn is_waiting_ack(&self) -> bool {
        self.waiting_ack
    }

    pub fn has_pending_strobe(&self) -> bool {
        self.pending.is_some()
    }

    pub fn events(&self) -> &EventCounts {
        &self.events
    }

    /// Replace the local inputs sampled on the next edge. A reset already
    /// staged with [`Responder::reset`] stays staged.
    pub fn drive_local(&mut self, inputs: LocalInputs) {
        let reset = self.local.reset || inputs.reset;
        self.local = LocalInputs { reset, ..inputs };
    }

    /// Local write on the next edge. Wins over any bus write in the same cycle.
    pub fn local_write(&mut self, value: u32) {
        self.local.write = Some(value);
    }

    /// Acknowledge pulse on the next edge.
    pub fn acknowledge(&mut self) {
        self.local.ack = true;
    }

    pub fn is_addressed(&self, req: &BusRequest) -> bool {
        req.address == self.config.address
    }

    // Strobe to act on this edge, given the wait state. Updates the latch.
    fn select_strobe(&mut self, addressed: bool, strobe: Option<Strobe>, ack: bool) -> Option<Strobe> {
        match self.config.ack_mode {
            AckMode::Required if self.waiting_ack => {
                if strobe.is_some() {
                    // Repeats of a held strobe merge into the one slot.
                    self.pending = strobe;
                }
                if ack {
                    self.waiting_ack = false;
                }
                None
            }
            // not waiting: serve a latched strobe, if any, with the live one
            _ => {
                let latched = self.pending.take();
                if !addressed {
                    if let Some(s) = latched {
                        log::warn!(
                            "register @{:#06X}: requester moved away with a latched {:?} strobe; dropped",
                            self.config.address,
                            s
                        );
                    }
                    return None;
                }
                strobe.or(latched)
            }
        }
    }

    fn record(&mut self, event: BusEvent) {
        if debug_flags::trace_register() {
            log::debug!("{}", event);
        }
        self.events.record(&event);
    }
}

impl Responder for SharedRegister {
    fn respond(&self, req: &BusRequest) -> BusResponse {
        let addressed = self.is_addressed(req);
        BusResponse {
            data: self.outputs.data,
            data_valid: self.outputs.data_valid,
            ready: !(addressed && self.waiting_ack),
        }
    }

    fn clock(&mut self, req: &BusRequest) {
        let local = std::mem::take(&mut self.local);
        let mut next = RegisterOutputs::default();

        let addressed = self.is_addressed(req);
        let strobe = if addressed { Strobe::of(req) } else { None };

        if local.reset {
            self.value = self.config.default;
            self.waiting_ack = false;
            // A read in flight survives reset and returns the default on the
            // next edge. A latched write is still held by its requester.
            if strobe == Some(Strobe::Read) {
                self.pending = strobe;
            }
            self.outputs = next;
            return;
        }

        let service = self.select_strobe(addressed, strobe, local.ack);

        let mut bus_write = None;
        match service {
            Some(Strobe::Read) => {
                next.data = self.value;
                next.data_valid = true;
                if self.config.ack_mode == AckMode::Required {
                    self.waiting_ack = true;
                }
            }
            Some(Strobe::Write) if self.config.read_only => {
                self.record(BusEvent::ReadOnlyWriteAttempted {
                    address: self.config.address,
                    data: req.data,
                });
            }
            Some(Strobe::Write) => {
                bus_write = Some(req.data);
                next.local_write_request = true;
                if self.config.ack_mode == AckMode::Required {
                    self.waiting_ack = true;
                }
            }
            None => {}
        }

        let local_write = if self.config.local_writer {
            local.write
        } else {
            if local.write.is_some() {
                log::debug!(
                    "register @{:#06X} has no local writer; local write ignored",
                    self.config.address
                );
            }
            None
        };

        match (local_write, bus_write) {
            (Some(local_value), Some(bus_value)) => {
                self.value = local_value;
                self.record(BusEvent::PriorityConflict {
                    address: self.config.address,
                    bus_value,
                    local_value,
                });
            }
            (Some(v), None) | (None, Some(v)) => self.value = v,
            (None, None) => {}
        }

        if debug_flags::trace_register() && (service.is_some() || local.ack) {
            log::trace!(
                "register @{:#06X}: service={:?} ack={} value={:#010X} waiting={}",
                self.config.address,
                service,
                local.ack,
                self.value,
                self.waiting_ack
            );
        }

        self.outputs = next;
    }

    fn decodes(&self, address: u32) -> bool {
        address == self.config.address
    }

    fn reset(&mut self) {
        self.local.reset = true;
    }
}
