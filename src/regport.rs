//! RegPort bus: request/response bundles and the multi-responder combine.
//!
//! A RegPort bus is word addressed and single outstanding. The requester
//! presents `address` (and `data` for writes), pulses exactly one strobe, and
//! holds everything stable until it sees `ready` (writes) or `data_valid`
//! (reads). Responders that do not decode the address drive an all-zero
//! response with `ready` high so that several of them can share the wires:
//! data and valid are OR-ed, ready is AND-ed.

use serde::{Deserialize, Serialize};

/// Bytes per RegPort word.
pub const WORD_BYTES: u32 = 4;

/// Requester side of the bus ("In" from a responder's point of view).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusRequest {
    /// Word address.
    pub address: u32,
    pub data: u32,
    pub read_strobe: bool,
    pub write_strobe: bool,
}

impl BusRequest {
    /// Address presented with no strobe, as a requester does while it waits.
    pub fn idle(address: u32) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    pub fn read(address: u32) -> Self {
        Self {
            address,
            read_strobe: true,
            ..Self::default()
        }
    }

    pub fn write(address: u32, data: u32) -> Self {
        Self {
            address,
            data,
            write_strobe: true,
            ..Self::default()
        }
    }

    #[inline]
    pub fn strobed(&self) -> bool {
        self.read_strobe || self.write_strobe
    }

    /// Both strobes in one cycle is a requester bug; responders may do anything.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        !(self.read_strobe && self.write_strobe)
    }
}

/// Which strobe a request carries. Write takes precedence in a malformed
/// request with both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strobe {
    Read,
    Write,
}

impl Strobe {
    pub fn of(req: &BusRequest) -> Option<Strobe> {
        if req.write_strobe {
            Some(Strobe::Write)
        } else if req.read_strobe {
            Some(Strobe::Read)
        } else {
            None
        }
    }
}

/// Responder side of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusResponse {
    pub data: u32,
    pub data_valid: bool,
    pub ready: bool,
}

impl BusResponse {
    /// What a responder drives when it is not addressed.
    pub const IDLE: BusResponse = BusResponse {
        data: 0,
        data_valid: false,
        ready: true,
    };
}

impl Default for BusResponse {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Merge the outputs of every responder sharing one bus.
///
/// `data` and `data_valid` are OR-ed, `ready` is AND-ed. An empty bus is
/// always ready and never returns data.
pub fn combine<I>(responses: I) -> BusResponse
where
    I: IntoIterator<Item = BusResponse>,
{
    responses
        .into_iter()
        .fold(BusResponse::IDLE, |acc, r| BusResponse {
            data: acc.data | r.data,
            data_valid: acc.data_valid || r.data_valid,
            ready: acc.ready && r.ready,
        })
}

/// Converts a byte address into RegPort word units. Returns `None` for an
/// address that is not word aligned, since partial-word access does not exist
/// on this bus.
pub fn byte_to_word(byte_address: u32) -> Option<u32> {
    if byte_address % WORD_BYTES == 0 {
        Some(byte_address / WORD_BYTES)
    } else {
        None
    }
}

#[inline]
pub fn word_to_byte(word_address: u32) -> u32 {
    word_address.wrapping_mul(WORD_BYTES)
}

/// Mask selecting the low `width` bits of an address.
#[inline]
pub fn address_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Conditions the bus absorbs silently. They never reach the requester as an
/// error; they are only counted and logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Strobe to an address no responder decodes. Reads never complete.
    AddressNotDecoded { address: u32 },
    /// Bus write to a read-only register, dropped.
    ReadOnlyWriteAttempted { address: u32, data: u32 },
    /// Local and bus write in the same cycle; the local value was kept.
    PriorityConflict {
        address: u32,
        bus_value: u32,
        local_value: u32,
    },
}

impl std::fmt::Display for BusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            BusEvent::AddressNotDecoded { address } => {
                write!(f, "strobe to undecoded address {:#06X}", address)
            }
            BusEvent::ReadOnlyWriteAttempted { address, data } => write!(
                f,
                "write {:#010X} to read-only register @{:#06X} dropped",
                data, address
            ),
            BusEvent::PriorityConflict {
                address,
                bus_value,
                local_value,
            } => write!(
                f,
                "register @{:#06X}: local write {:#010X} overrides bus write {:#010X}",
                address, local_value, bus_value
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub not_decoded: u64,
    pub read_only_writes: u64,
    pub priority_conflicts: u64,
}

impl EventCounts {
    pub fn record(&mut self, event: &BusEvent) {
        match event {
            BusEvent::AddressNotDecoded { .. } => self.not_decoded += 1,
            BusEvent::ReadOnlyWriteAttempted { .. } => self.read_only_writes += 1,
            BusEvent::PriorityConflict { .. } => self.priority_conflicts += 1,
        }
    }

    pub fn merged(&self, other: &EventCounts) -> EventCounts {
        EventCounts {
            not_decoded: self.not_decoded + other.not_decoded,
            read_only_writes: self.read_only_writes + other.read_only_writes,
            priority_conflicts: self.priority_conflicts + other.priority_conflicts,
        }
    }
}

/// A device on the RegPort bus.
///
/// Evaluation is split the way the clock splits it: [`Responder::respond`] is
/// the combinational view of the outputs for the request currently on the
/// wires, [`Responder::clock`] is the rising edge that samples that request.
pub trait Responder {
    /// Outputs for the request currently presented. Must not change state.
    fn respond(&self, req: &BusRequest) -> BusResponse;

    /// Rising clock edge.
    fn clock(&mut self, req: &BusRequest);

    /// Whether this responder claims `address`.
    fn decodes(&self, address: u32) -> bool;

    /// How many devices behind this responder claim `address`. Anything
    /// above one is a decode bug.
    fn decoder_count(&self, address: u32) -> usize {
        usize::from(self.decodes(address))
    }

    /// Synchronous reset, applied on the next clock edge.
    fn reset(&mut self) {}
}

impl<R: Responder + ?Sized> Responder for Box<R> {
    fn respond(&self, req: &BusRequest) -> BusResponse {
        (**self).respond(req)
    }

    fn clock(&mut self, req: &BusRequest) {
        (**self).clock(req)
    }

    fn decodes(&self, address: u32) -> bool {
        (**self).decodes(address)
    }

    fn decoder_count(&self, address: u32) -> usize {
        (**self).decoder_count(address)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
