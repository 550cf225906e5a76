// AXI-Lite signal bundles seen by the bridge

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Write strobes (WSTRB). Accepted on the write data channel but only
    /// full-word writes are forwarded, so the mask is never applied.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ByteEnable: u8 {
        const LANE0 = 0b0001;
        const LANE1 = 0b0010;
        const LANE2 = 0b0100;
        const LANE3 = 0b1000;
        const ALL = 0b1111;
    }
}

/// 2-bit response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resp {
    Okay,
    SlaveError,
}

impl Resp {
    pub fn bits(self) -> u8 {
        match self {
            Resp::Okay => 0b00,
            Resp::SlaveError => 0b10,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Resp> {
        match bits & 0b11 {
            0b00 => Some(Resp::Okay),
            0b10 => Some(Resp::SlaveError),
            _ => None,
        }
    }
}

/// AW or AR channel driven by the master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddrBeat {
    /// Byte address.
    pub addr: u32,
    pub valid: bool,
}

/// W channel driven by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBeat {
    pub data: u32,
    pub strb: ByteEnable,
    pub valid: bool,
}

impl Default for WriteBeat {
    fn default() -> Self {
        Self {
            data: 0,
            strb: ByteEnable::ALL,
            valid: false,
        }
    }
}

/// B channel driven by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespBeat {
    pub resp: Resp,
    pub valid: bool,
}

/// R channel driven by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBeat {
    pub data: u32,
    pub resp: Resp,
    pub valid: bool,
}

/// Everything the master drives in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxiLiteInputs {
    pub aw: AddrBeat,
    pub w: WriteBeat,
    pub b_ready: bool,
    pub ar: AddrBeat,
    pub r_ready: bool,
}

/// Everything the bridge drives in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxiLiteOutputs {
    pub aw_ready: bool,
    pub w_ready: bool,
    pub b: RespBeat,
    pub ar_ready: bool,
    pub r: ReadBeat,
}
