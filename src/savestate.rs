use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bridge::AxiLiteBridge;
use crate::monitor::ContractMonitor;

/// Device-side snapshot of a testbench: bridge, responders and monitor.
/// Masters are test stimulus and are not saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState<R> {
    pub version: u32,
    pub timestamp: u64,
    pub cycle: u64,
    pub bridge: AxiLiteBridge,
    pub responder: R,
    pub monitor: ContractMonitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveInfo {
    pub version: u32,
    pub timestamp: u64,
    pub cycle: u64,
}

impl<R> SaveState<R> {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(cycle: u64, bridge: AxiLiteBridge, responder: R, monitor: ContractMonitor) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: Self::CURRENT_VERSION,
            timestamp,
            cycle,
            bridge,
            responder,
            monitor,
        }
    }

    pub fn info(&self) -> SaveInfo {
        SaveInfo {
            version: self.version,
            timestamp: self.timestamp,
            cycle: self.cycle,
        }
    }

    fn check_version(self) -> Result<Self, String> {
        if self.version > Self::CURRENT_VERSION {
            return Err(format!(
                "Save state version {} is not supported (current: {})",
                self.version,
                Self::CURRENT_VERSION
            ));
        }
        Ok(self)
    }
}

// `.json` paths use JSON when the feature is on; everything else is bincode
fn wants_json(path: &Path) -> bool {
    cfg!(feature = "json-state")
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

impl<R: Serialize> SaveState<R> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        bincode::serialize(self).map_err(|e| format!("Failed to serialize save state: {}", e))
    }

    #[cfg(feature = "json-state")]
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize save state: {}", e))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), String> {
        let data = if wants_json(path) {
            self.encode_json()?
        } else {
            self.to_bytes()?
        };
        let mut file =
            File::create(path).map_err(|e| format!("Failed to create save file: {}", e))?;
        file.write_all(&data)
            .map_err(|e| format!("Failed to write save file: {}", e))?;
        log::info!("saved state at cycle {} to {}", self.cycle, path.display());
        Ok(())
    }

    #[cfg(feature = "json-state")]
    fn encode_json(&self) -> Result<Vec<u8>, String> {
        self.to_json().map(String::into_bytes)
    }

    #[cfg(not(feature = "json-state"))]
    fn encode_json(&self) -> Result<Vec<u8>, String> {
        Err("JSON save states need the json-state feature".to_string())
    }
}

impl<R: DeserializeOwned> SaveState<R> {
    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        let state: Self = bincode::deserialize(data)
            .map_err(|e| format!("Failed to deserialize save state: {}", e))?;
        state.check_version()
    }

    #[cfg(feature = "json-state")]
    pub fn from_json(json: &str) -> Result<Self, String> {
        let state: Self = serde_json::from_str(json)
            .map_err(|e| format!("Failed to deserialize save state: {}", e))?;
        state.check_version()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let mut file = File::open(path).map_err(|e| format!("Failed to open save file: {}", e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| format!("Failed to read save file: {}", e))?;

        let state = if wants_json(path) {
            Self::decode_json(&data)?
        } else {
            Self::from_bytes(&data)?
        };
        log::info!("loaded state at cycle {} from {}", state.cycle, path.display());
        Ok(state)
    }

    #[cfg(feature = "json-state")]
    fn decode_json(data: &[u8]) -> Result<Self, String> {
        let json = std::str::from_utf8(data).map_err(|e| format!("Invalid save file format: {}", e))?;
        Self::from_json(json)
    }

    #[cfg(not(feature = "json-state"))]
    fn decode_json(_data: &[u8]) -> Result<Self, String> {
        Err("JSON save states need the json-state feature".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeConfig;
    use crate::error::SimError;
    use crate::register::bank::{HostIdentity, HostRegisters, RegisterBank};
    use crate::register::{RegisterConfig, SharedRegister};
    use crate::testbench::{Testbench, TestbenchConfig};

    fn config() -> TestbenchConfig {
        TestbenchConfig {
            bridge: BridgeConfig::default(),
            timeout_cycles: 200,
            strict: true,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("regport-sim-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_bytes_roundtrip_keeps_register_value() {
        let mut tb = Testbench::with_config(SharedRegister::new(RegisterConfig::read_write(0x10, 0)), config());
        tb.write(0x40, 0x0BAD_F00D).unwrap();

        let state = tb.save_state().unwrap();
        let bytes = state.to_bytes().unwrap();
        let restored: SaveState<SharedRegister> = SaveState::from_bytes(&bytes).unwrap();
        assert_eq!(restored, state);

        let mut tb = Testbench::from_state(restored, config());
        assert_eq!(tb.responder().value(), 0x0BAD_F00D);
        assert_eq!(tb.read(0x40).unwrap().0, 0x0BAD_F00D);
    }

    #[test]
    fn test_refuses_save_with_transactions_in_flight() {
        let mut tb = Testbench::with_config(SharedRegister::new(RegisterConfig::read_write(0x10, 0)), config());
        tb.master_mut().write(0x40, 1);
        tb.step().unwrap();
        assert!(matches!(tb.save_state(), Err(SimError::SaveState(_))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let tb = Testbench::with_config(SharedRegister::new(RegisterConfig::read_write(0x10, 0)), config());
        let mut state = tb.save_state().unwrap();
        state.version = SaveState::<SharedRegister>::CURRENT_VERSION + 1;
        let bytes = state.to_bytes().unwrap();
        let err = SaveState::<SharedRegister>::from_bytes(&bytes).unwrap_err();
        assert!(err.contains("not supported"), "{}", err);
    }

    #[test]
    fn test_file_roundtrip_host_block() {
        let identity = HostIdentity {
            signature: 0x5245_4750,
            version: 2,
            min_compatible_version: 1,
        };
        let mut tb = Testbench::with_config(HostRegisters::new(0x100, identity, 0).unwrap(), config());
        tb.write(0x40C, 0x1357_9BDF).unwrap();

        let path = temp_path("host.state");
        tb.save_state().unwrap().save_to_file(&path).unwrap();
        let loaded: SaveState<HostRegisters> = SaveState::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.info().cycle, tb.cycle());
        assert_eq!(loaded.responder.scratch().unwrap().value(), 0x1357_9BDF);
    }

    // Same wire shape as `HostRegisters`, without the layout checks.
    #[derive(Serialize)]
    struct LooseHost {
        base: u32,
        bank: RegisterBank,
    }

    #[test]
    fn test_malformed_host_block_rejected_on_load() {
        let bank = RegisterBank::new([RegisterConfig::read_write(0x100, 0)]).unwrap();
        let host = LooseHost { base: 0x100, bank };
        let tb = Testbench::with_config(SharedRegister::new(RegisterConfig::read_write(0x10, 0)), config());
        let state = tb.save_state().unwrap();
        let loose = SaveState {
            version: state.version,
            timestamp: state.timestamp,
            cycle: state.cycle,
            bridge: state.bridge,
            responder: host,
            monitor: state.monitor,
        };

        let bytes = loose.to_bytes().unwrap();
        let err = SaveState::<HostRegisters>::from_bytes(&bytes).unwrap_err();
        assert!(err.contains("expected 4"), "{}", err);
    }

    #[test]
    fn test_overlapping_bank_rejected_on_load() {
        // two registers, then relabel the second onto the first's address
        let bank = RegisterBank::new([
            RegisterConfig::read_write(0x10, 0),
            RegisterConfig::read_write(0x11, 0),
        ])
        .unwrap();
        let mut bytes = bincode::serialize(&bank).unwrap();
        let good = bincode::serialize(&RegisterConfig::read_write(0x11, 0)).unwrap();
        let bad = bincode::serialize(&RegisterConfig::read_write(0x10, 0)).unwrap();
        let at = bytes
            .windows(good.len())
            .position(|w| w == good.as_slice())
            .unwrap();
        bytes[at..at + good.len()].copy_from_slice(&bad);

        let err = bincode::deserialize::<RegisterBank>(&bytes).unwrap_err();
        assert!(err.to_string().contains("both decode"), "{}", err);
    }

    #[cfg(feature = "json-state")]
    #[test]
    fn test_json_file_roundtrip() {
        let mut tb = Testbench::with_config(SharedRegister::new(RegisterConfig::read_write(0x10, 7)), config());
        tb.write(0x40, 42).unwrap();

        let path = temp_path("reg.json");
        tb.save_state().unwrap().save_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: SaveState<SharedRegister> = SaveState::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(text.contains("\"cycle\""));
        assert_eq!(loaded.responder.value(), 42);
    }
}
