// Address-decoded bank of shared registers and the host register map.

use serde::{Deserialize, Serialize};

use super::{RegisterConfig, SharedRegister};
use crate::error::SimError;
use crate::regport::{combine, BusEvent, BusRequest, BusResponse, EventCounts, Responder, WORD_BYTES};

/// Ordered list of registers sharing one bus. Outputs are folded in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BankState")]
pub struct RegisterBank {
    registers: Vec<SharedRegister>,
    events: EventCounts,
}

// Decoded form of a bank, checked before it becomes a `RegisterBank`.
#[derive(Deserialize)]
struct BankState {
    registers: Vec<SharedRegister>,
    events: EventCounts,
}

impl TryFrom<BankState> for RegisterBank {
    type Error = SimError;

    fn try_from(state: BankState) -> Result<Self, SimError> {
        check_overlap(&state.registers)?;
        Ok(Self {
            registers: state.registers,
            events: state.events,
        })
    }
}

fn check_overlap(registers: &[SharedRegister]) -> Result<(), SimError> {
    for (second, r) in registers.iter().enumerate() {
        let address = r.config().address;
        if let Some(first) = registers[..second].iter().position(|o| o.decodes(address)) {
            return Err(SimError::DecodeOverlap { first, second });
        }
    }
    Ok(())
}

impl RegisterBank {
    /// Fails if two configs decode the same word address.
    pub fn new<I>(configs: I) -> Result<Self, SimError>
    where
        I: IntoIterator<Item = RegisterConfig>,
    {
        let registers: Vec<SharedRegister> = configs.into_iter().map(SharedRegister::new).collect();
        check_overlap(&registers)?;
        Ok(Self {
            registers,
            events: EventCounts::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn registers(&self) -> &[SharedRegister] {
        &self.registers
    }

    pub fn register(&self, address: u32) -> Option<&SharedRegister> {
        self.registers.iter().find(|r| r.decodes(address))
    }

    pub fn register_mut(&mut self, address: u32) -> Option<&mut SharedRegister> {
        self.registers.iter_mut().find(|r| r.decodes(address))
    }

    /// Bank-level counts plus every register's own.
    pub fn events(&self) -> EventCounts {
        self.registers
            .iter()
            .fold(self.events, |acc, r| acc.merged(r.events()))
    }
}

impl Responder for RegisterBank {
    fn respond(&self, req: &BusRequest) -> BusResponse {
        debug_assert!(
            self.decoder_count(req.address) <= 1,
            "address {:#06X} decoded by more than one register",
            req.address
        );
        combine(self.registers.iter().map(|r| r.respond(req)))
    }

    fn clock(&mut self, req: &BusRequest) {
        if req.strobed() && !self.decodes(req.address) {
            let event = BusEvent::AddressNotDecoded {
                address: req.address,
            };
            log::debug!("{}", event);
            self.events.record(&event);
        }
        for r in &mut self.registers {
            r.clock(req);
        }
    }

    fn decodes(&self, address: u32) -> bool {
        self.registers.iter().any(|r| r.decodes(address))
    }

    fn decoder_count(&self, address: u32) -> usize {
        self.registers.iter().filter(|r| r.decodes(address)).count()
    }

    fn reset(&mut self) {
        for r in &mut self.registers {
            r.reset();
        }
    }
}

// Host register map, byte offsets from the block base
pub const SIGNATURE_OFFSET: u32 = 0x0;
pub const VERSION_OFFSET: u32 = 0x4;
pub const MIN_VERSION_OFFSET: u32 = 0x8;
pub const SCRATCH_OFFSET: u32 = 0xC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    pub signature: u32,
    pub version: u32,
    /// Oldest host software version this block still talks to.
    pub min_compatible_version: u32,
}

/// Identification block a host reads first: three constants and a scratch
/// word used to check that bus writes land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HostState")]
pub struct HostRegisters {
    base: u32,
    bank: RegisterBank,
}

#[derive(Deserialize)]
struct HostState {
    base: u32,
    bank: RegisterBank,
}

impl TryFrom<HostState> for HostRegisters {
    type Error = SimError;

    fn try_from(state: HostState) -> Result<Self, SimError> {
        let host = Self {
            base: state.base,
            bank: state.bank,
        };
        host.check_layout()?;
        Ok(host)
    }
}

fn offset_word(base: u32, offset: u32) -> Result<u32, SimError> {
    base.checked_add(offset / WORD_BYTES).ok_or_else(|| {
        SimError::InvalidLayout(format!(
            "host block at word {:#X} runs past the address space",
            base
        ))
    })
}

impl HostRegisters {
    /// `base` is a word address.
    pub fn new(base: u32, identity: HostIdentity, scratch_default: u32) -> Result<Self, SimError> {
        let word = |offset: u32| offset_word(base, offset);
        let bank = RegisterBank::new([
            RegisterConfig::constant(word(SIGNATURE_OFFSET)?, identity.signature),
            RegisterConfig::constant(word(VERSION_OFFSET)?, identity.version),
            RegisterConfig::constant(word(MIN_VERSION_OFFSET)?, identity.min_compatible_version),
            RegisterConfig::read_write(word(SCRATCH_OFFSET)?, scratch_default),
        ])?;
        Ok(Self { base, bank })
    }

    // Four registers, constants at 0/4/8 and a writable scratch at 12.
    fn check_layout(&self) -> Result<(), SimError> {
        if self.bank.len() != 4 {
            return Err(SimError::InvalidLayout(format!(
                "host block has {} registers, expected 4",
                self.bank.len()
            )));
        }
        for (offset, read_only) in [
            (SIGNATURE_OFFSET, true),
            (VERSION_OFFSET, true),
            (MIN_VERSION_OFFSET, true),
            (SCRATCH_OFFSET, false),
        ] {
            let word = offset_word(self.base, offset)?;
            match self.bank.register(word) {
                Some(r) if r.config().read_only == read_only => {}
                Some(_) => {
                    return Err(SimError::InvalidLayout(format!(
                        "offset {:#X} has the wrong access mode",
                        offset
                    )))
                }
                None => {
                    return Err(SimError::InvalidLayout(format!(
                        "nothing at offset {:#X} (word {:#X})",
                        offset, word
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    fn scratch_word(&self) -> u32 {
        self.base.wrapping_add(SCRATCH_OFFSET / WORD_BYTES)
    }

    pub fn scratch(&self) -> Option<&SharedRegister> {
        self.bank.register(self.scratch_word())
    }
}

impl Responder for HostRegisters {
    fn respond(&self, req: &BusRequest) -> BusResponse {
        self.bank.respond(req)
    }

    fn clock(&mut self, req: &BusRequest) {
        self.bank.clock(req)
    }

    fn decodes(&self, address: u32) -> bool {
        self.bank.decodes(address)
    }

    fn decoder_count(&self, address: u32) -> usize {
        self.bank.decoder_count(address)
    }

    fn reset(&mut self) {
        self.bank.reset()
    }
}
