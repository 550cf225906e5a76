//! Named end-to-end scenarios, run by the binary and by the test suite.
//!
//! Each one builds its own testbench, drives it to completion and reports
//! the first thing that did not match as `SimError::ScenarioFailed`.

use crate::bridge::axi::Resp;
use crate::error::SimError;
use crate::master::{Access, AxiCompletion, MasterVariant, RegPortMaster};
use crate::register::bank::{
    HostIdentity, HostRegisters, RegisterBank, MIN_VERSION_OFFSET, SCRATCH_OFFSET, SIGNATURE_OFFSET,
    VERSION_OFFSET,
};
use crate::register::{RegisterConfig, SharedRegister};
use crate::regport::{word_to_byte, Responder};
use crate::testbench::{PortBench, Testbench, TestbenchConfig};

/// Word address used by the single-register scenarios (byte offset 0x40).
const REG_WORD: u32 = 0x10;
const REG_BYTE: u32 = 0x40;

/// Cycles the ack scenario leaves the acknowledgment off.
const ACK_HOLD_CYCLES: u32 = 6;

const HOST_BASE_WORD: u32 = 0x100;
const HOST_IDENTITY: HostIdentity = HostIdentity {
    signature: 0x5245_4750,
    version: 0x0001_0002,
    min_compatible_version: 0x0001_0000,
};

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    run: fn() -> Result<(), SimError>,
}

impl Scenario {
    pub fn run(&self) -> Result<(), SimError> {
        log::debug!("scenario {} starting", self.name);
        let result = (self.run)();
        match &result {
            Ok(()) => log::debug!("scenario {} passed", self.name),
            Err(e) => log::error!("scenario {} failed: {}", self.name, e),
        }
        result
    }
}

static SCENARIOS: [Scenario; 8] = [
    Scenario {
        name: "reset-default",
        description: "read after reset returns the configured default",
        run: reset_default,
    },
    Scenario {
        name: "write-read",
        description: "AXI write then read of byte offset 0x40",
        run: write_read,
    },
    Scenario {
        name: "local-priority",
        description: "local write beats a bus write in the same cycle",
        run: local_priority,
    },
    Scenario {
        name: "ack-backpressure",
        description: "ack-mode register holds ready low until acknowledged",
        run: ack_backpressure,
    },
    Scenario {
        name: "skewed-write",
        description: "write address and data arriving 3 cycles apart, both orders",
        run: skewed_write,
    },
    Scenario {
        name: "host-map",
        description: "identification block constants and scratch register",
        run: host_map,
    },
    Scenario {
        name: "master-variants",
        description: "strobe-first and ready-first masters against both ack modes",
        run: master_variants,
    },
    Scenario {
        name: "concurrent-access",
        description: "simultaneous AXI read and write share the bus without overlap",
        run: concurrent_access,
    },
];

pub fn all() -> &'static [Scenario] {
    &SCENARIOS
}

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

fn ensure(name: &str, ok: bool, detail: impl FnOnce() -> String) -> Result<(), SimError> {
    if ok {
        Ok(())
    } else {
        Err(SimError::ScenarioFailed {
            name: name.to_string(),
            detail: detail(),
        })
    }
}

fn expect_word(name: &str, what: &str, got: u32, want: u32) -> Result<(), SimError> {
    ensure(name, got == want, || {
        format!("{}: got {:#010X}, expected {:#010X}", what, got, want)
    })
}

fn bench<R: Responder>(responder: R) -> Testbench<R> {
    Testbench::with_config(
        responder,
        TestbenchConfig {
            strict: true,
            ..TestbenchConfig::default()
        },
    )
}

fn reset_default() -> Result<(), SimError> {
    const NAME: &str = "reset-default";
    let mut tb = bench(SharedRegister::new(RegisterConfig::read_write(REG_WORD, 0xDEAD_BEEF)));

    tb.write(REG_BYTE, 0x0000_0001)?;
    tb.reset_responder()?;
    expect_word(NAME, "value after reset", tb.responder().value(), 0xDEAD_BEEF)?;

    let (data, resp) = tb.read(REG_BYTE)?;
    expect_word(NAME, "read after reset", data, 0xDEAD_BEEF)?;
    ensure(NAME, resp == Resp::Okay, || format!("read answered {:?}", resp))
}

fn write_read() -> Result<(), SimError> {
    const NAME: &str = "write-read";
    let mut tb = bench(SharedRegister::new(RegisterConfig::read_write(REG_WORD, 0)));

    let resp = tb.write(REG_BYTE, 0x1234_5678)?;
    ensure(NAME, resp == Resp::Okay, || format!("write answered {:?}", resp))?;
    let (data, _) = tb.read(REG_BYTE)?;
    expect_word(NAME, "read back", data, 0x1234_5678)
}

fn local_priority() -> Result<(), SimError> {
    const NAME: &str = "local-priority";
    let mut tb = bench(SharedRegister::new(RegisterConfig::read_write(REG_WORD, 0)));

    tb.master_mut().write(REG_BYTE, 0x1111_1111);
    tb.run_until("bus write strobe", |tb| tb.peek_request().write_strobe)?;
    tb.responder_mut().local_write(0x2222_2222);
    tb.run_until("write response", |tb| tb.master().is_done())?;

    expect_word(NAME, "stored value", tb.responder().value(), 0x2222_2222)?;
    let conflicts = tb.responder().events().priority_conflicts;
    ensure(NAME, conflicts == 1, || format!("{} priority conflicts recorded", conflicts))?;
    let (data, _) = tb.read(REG_BYTE)?;
    expect_word(NAME, "bus read", data, 0x2222_2222)
}

fn ack_backpressure() -> Result<(), SimError> {
    const NAME: &str = "ack-backpressure";
    let mut tb = bench(SharedRegister::new(
        RegisterConfig::read_write(REG_WORD, 0xA5A5_0001).with_ack(),
    ));
    let ready_now = |tb: &Testbench<SharedRegister>| tb.responder().respond(&tb.peek_request()).ready;

    tb.master_mut().read(REG_BYTE);
    tb.run_until("read strobe", |tb| tb.peek_request().read_strobe)?;
    ensure(NAME, ready_now(&tb), || "ready low before the read".to_string())?;
    tb.step()?;

    for n in 0..ACK_HOLD_CYCLES {
        ensure(NAME, !ready_now(&tb), || format!("ready high {} cycles after the read", n))?;
        tb.step()?;
    }

    tb.responder_mut().acknowledge();
    ensure(NAME, !ready_now(&tb), || "ready high in the ack cycle".to_string())?;
    tb.step()?;
    ensure(NAME, ready_now(&tb), || "ready still low after the ack".to_string())?;

    tb.run_until("read data", |tb| tb.master().is_done())?;
    let data = tb.master().completed().iter().find_map(|c| match *c {
        AxiCompletion::Read { data, .. } => Some(data),
        _ => None,
    });
    ensure(NAME, data == Some(0xA5A5_0001), || format!("read returned {:?}", data))
}

fn skewed_write() -> Result<(), SimError> {
    const NAME: &str = "skewed-write";
    let mut tb = bench(SharedRegister::new(RegisterConfig::read_write(REG_WORD, 0)));

    for (aw_delay, w_delay, value) in [(0, 3, 0x0000_A0A0), (3, 0, 0x0000_0B0B)] {
        tb.master_mut().write_skewed(REG_BYTE, value, aw_delay, w_delay);
        let mut pulses = 0;
        tb.run_until("skewed write response", |tb| {
            if tb.responder().local_write_request() {
                pulses += 1;
            }
            tb.master().is_done()
        })?;
        expect_word(NAME, "stored value", tb.responder().value(), value)?;
        ensure(NAME, pulses == 1, || {
            format!("{} write pulses for aw+{} w+{}", pulses, aw_delay, w_delay)
        })?;
    }
    Ok(())
}

fn host_map() -> Result<(), SimError> {
    const NAME: &str = "host-map";
    let mut tb = bench(HostRegisters::new(HOST_BASE_WORD, HOST_IDENTITY, 0)?);
    let base = word_to_byte(HOST_BASE_WORD);

    for (offset, want) in [
        (SIGNATURE_OFFSET, HOST_IDENTITY.signature),
        (VERSION_OFFSET, HOST_IDENTITY.version),
        (MIN_VERSION_OFFSET, HOST_IDENTITY.min_compatible_version),
        (SCRATCH_OFFSET, 0),
    ] {
        let (data, _) = tb.read(base + offset)?;
        expect_word(NAME, &format!("offset {:#X}", offset), data, want)?;
    }

    // constants complete normally but keep their value
    let resp = tb.write(base + SIGNATURE_OFFSET, 0xFFFF_FFFF)?;
    ensure(NAME, resp == Resp::Okay, || format!("constant write answered {:?}", resp))?;
    let (data, _) = tb.read(base + SIGNATURE_OFFSET)?;
    expect_word(NAME, "signature after write", data, HOST_IDENTITY.signature)?;

    tb.write(base + SCRATCH_OFFSET, 0x600D_CAFE)?;
    let (data, _) = tb.read(base + SCRATCH_OFFSET)?;
    expect_word(NAME, "scratch", data, 0x600D_CAFE)?;

    let ro = tb.responder().bank().events().read_only_writes;
    ensure(NAME, ro == 1, || format!("{} read-only writes recorded", ro))
}

// Steps until the master is done, acknowledging whenever the register waits.
fn run_with_ack(pb: &mut PortBench<SharedRegister>, what: &str) -> Result<(), SimError> {
    let budget = crate::debug_flags::timeout_cycles();
    for _ in 0..budget {
        if pb.master().is_done() {
            return Ok(());
        }
        if pb.responder().is_waiting_ack() {
            pb.responder_mut().acknowledge();
        }
        pb.step();
    }
    Err(SimError::Timeout {
        cycles: budget,
        waiting_for: what.to_string(),
    })
}

fn master_variants() -> Result<(), SimError> {
    const NAME: &str = "master-variants";
    let accesses = [
        Access::Write {
            address: REG_WORD,
            data: 0x1111_0000,
        },
        Access::Read { address: REG_WORD },
        Access::Write {
            address: REG_WORD,
            data: 0x0000_2222,
        },
        Access::Read { address: REG_WORD },
    ];

    for variant in [MasterVariant::StrobeFirst, MasterVariant::ReadyFirst] {
        for config in [
            RegisterConfig::read_write(REG_WORD, 0),
            RegisterConfig::read_write(REG_WORD, 0).with_ack(),
        ] {
            let mut master = RegPortMaster::new(variant);
            for a in accesses {
                master.push(a);
            }
            let mut pb = PortBench::new(master, SharedRegister::new(config));

            run_with_ack(&mut pb, &format!("{:?} master with {:?}", variant, config.ack_mode))?;

            let reads: Vec<Option<u32>> = pb
                .master()
                .completed()
                .iter()
                .filter(|c| matches!(c.access, Access::Read { .. }))
                .map(|c| c.data)
                .collect();
            ensure(NAME, reads == [Some(0x1111_0000), Some(0x0000_2222)], || {
                format!("{:?} / {:?}: reads returned {:?}", variant, config.ack_mode, reads)
            })?;
            ensure(NAME, pb.monitor().is_clean(), || {
                format!("{:?} / {:?}: {:?}", variant, config.ack_mode, pb.monitor().violations())
            })?;
        }
    }
    Ok(())
}

fn concurrent_access() -> Result<(), SimError> {
    const NAME: &str = "concurrent-access";
    let bank = RegisterBank::new([
        RegisterConfig::read_write(REG_WORD, 0),
        RegisterConfig::read_write(REG_WORD + 1, 0x0F0F_0F0F),
    ])?;
    let mut tb = bench(bank);

    tb.master_mut().write(REG_BYTE, 0x7777_7777);
    tb.master_mut().read(REG_BYTE + 4);
    tb.run_until("both transactions", |tb| tb.master().is_done())?;

    let read = tb.master().completed().iter().find_map(|c| match *c {
        AxiCompletion::Read { data, .. } => Some(data),
        _ => None,
    });
    ensure(NAME, read == Some(0x0F0F_0F0F), || format!("read returned {:?}", read))?;

    let stored = tb.responder().register(REG_WORD).map(|r| r.value());
    ensure(NAME, stored == Some(0x7777_7777), || format!("write stored {:?}", stored))?;
    let monitor = tb.monitor();
    ensure(NAME, monitor.completed_reads() == 1 && monitor.completed_writes() == 1, || {
        format!(
            "monitor saw {} reads and {} writes",
            monitor.completed_reads(),
            monitor.completed_writes()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_passes() {
        for s in all() {
            if let Err(e) = s.run() {
                panic!("{}: {}", s.name, e);
            }
        }
    }

    #[test]
    fn test_scenario_names_unique() {
        for (i, s) in all().iter().enumerate() {
            assert!(all()[i + 1..].iter().all(|o| o.name != s.name), "{}", s.name);
            assert!(find(s.name).is_some());
        }
        assert!(find("no-such-scenario").is_none());
    }

    #[test]
    fn test_failed_check_names_scenario() {
        let err = expect_word("demo", "value", 1, 2).unwrap_err();
        match err {
            SimError::ScenarioFailed { name, detail } => {
                assert_eq!(name, "demo");
                assert!(detail.contains("0x00000001"), "{}", detail);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
