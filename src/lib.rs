//! Cycle-level model of the RegPort register bus: shared host/local
//! registers, the AXI-Lite bridge in front of them, requester models and a
//! lock-step testbench with a contract monitor.

pub mod bridge;
pub mod debug_flags;
pub mod error;
pub mod master;
pub mod monitor;
pub mod register;
pub mod regport;
pub mod savestate;
pub mod scenarios;
pub mod testbench;

pub use bridge::{AxiLiteBridge, BridgeConfig};
pub use error::SimError;
pub use register::bank::{HostIdentity, HostRegisters, RegisterBank};
pub use register::{AckMode, RegisterConfig, SharedRegister};
pub use regport::{BusRequest, BusResponse, Responder};
pub use testbench::{PortBench, Testbench, TestbenchConfig};
