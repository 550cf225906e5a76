//! Environment-driven diagnostics. Each flag is read once and cached.

use std::sync::OnceLock;

/// Cycle budget used by the testbench when nothing else is configured.
pub const DEFAULT_TIMEOUT_CYCLES: u64 = 1_000;

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

// Per-cycle dump of the RegPort request/response pair (very noisy)
pub fn trace_bus() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("TRACE_BUS", false))
}

// Bridge state-machine transitions and AXI handshakes
pub fn trace_bridge() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("TRACE_BRIDGE", false))
}

// Register strobes, local writes and acknowledgments
pub fn trace_register() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("TRACE_REGISTER", false))
}

pub fn quiet() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("QUIET", false))
}

// Fail the run on the first contract violation instead of only recording it.
pub fn strict_contract() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("STRICT_CONTRACT", false))
}

pub fn timeout_cycles() -> u64 {
    static V: OnceLock<u64> = OnceLock::new();
    *V.get_or_init(|| env_u64("SIM_TIMEOUT_CYCLES", DEFAULT_TIMEOUT_CYCLES))
}
