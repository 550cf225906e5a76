//! Lock-step clock driver.
//!
//! Every cycle first evaluates all combinational outputs from the current
//! state (master, bridge, responders), lets the monitor look at the bus, and
//! only then clocks every component with the values it sampled. No
//! component sees another's next state within the same cycle.

use crate::bridge::axi::Resp;
use crate::bridge::{AxiLiteBridge, BridgeConfig};
use crate::debug_flags;
use crate::error::SimError;
use crate::master::{AxiCompletion, AxiLiteMaster, Completion, RegPortMaster};
use crate::monitor::ContractMonitor;
use crate::regport::{BusRequest, BusResponse, Responder};
use crate::savestate::SaveState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestbenchConfig {
    pub bridge: BridgeConfig,
    /// Cycle budget for any single wait.
    pub timeout_cycles: u64,
    /// Stop on the first contract violation.
    pub strict: bool,
}

impl Default for TestbenchConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            timeout_cycles: debug_flags::timeout_cycles(),
            strict: debug_flags::strict_contract(),
        }
    }
}

fn trace_cycle(cycle: u64, req: &BusRequest, resp: &BusResponse) {
    if debug_flags::trace_bus() && !debug_flags::quiet() {
        log::trace!(
            "[{:>6}] addr={:#06X} data={:#010X} rd={} wr={} | rdata={:#010X} valid={} ready={}",
            cycle,
            req.address,
            req.data,
            req.read_strobe as u8,
            req.write_strobe as u8,
            resp.data,
            resp.data_valid as u8,
            resp.ready as u8
        );
    }
}

/// AXI-Lite master -> bridge -> RegPort bus -> responder.
#[derive(Debug, Clone)]
pub struct Testbench<R> {
    config: TestbenchConfig,
    cycle: u64,
    master: AxiLiteMaster,
    bridge: AxiLiteBridge,
    responder: R,
    monitor: ContractMonitor,
    last_request: BusRequest,
    last_response: BusResponse,
}

impl<R: Responder> Testbench<R> {
    pub fn new(responder: R) -> Self {
        Self::with_config(responder, TestbenchConfig::default())
    }

    pub fn with_config(responder: R, config: TestbenchConfig) -> Self {
        Self {
            config,
            cycle: 0,
            master: AxiLiteMaster::new(),
            bridge: AxiLiteBridge::new(config.bridge),
            responder,
            monitor: ContractMonitor::new(),
            last_request: BusRequest::default(),
            last_response: BusResponse::IDLE,
        }
    }

    pub fn config(&self) -> &TestbenchConfig {
        &self.config
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn master(&self) -> &AxiLiteMaster {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut AxiLiteMaster {
        &mut self.master
    }

    pub fn bridge(&self) -> &AxiLiteBridge {
        &self.bridge
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    /// Local-side inputs staged here apply on the next `step`.
    pub fn responder_mut(&mut self) -> &mut R {
        &mut self.responder
    }

    pub fn monitor(&self) -> &ContractMonitor {
        &self.monitor
    }

    /// Bus request driven during the last completed cycle.
    pub fn last_request(&self) -> BusRequest {
        self.last_request
    }

    pub fn last_response(&self) -> BusResponse {
        self.last_response
    }

    /// Bus request the bridge drives in the coming cycle.
    pub fn peek_request(&self) -> BusRequest {
        self.bridge.bus_request()
    }

    pub fn step(&mut self) -> Result<(), SimError> {
        let axi_in = self.master.inputs();
        let axi_out = self.bridge.outputs();
        let req = self.bridge.bus_request();
        let resp = self.responder.respond(&req);
        let decoders = self.responder.decoder_count(req.address);

        trace_cycle(self.cycle, &req, &resp);
        let fresh = self.monitor.observe(&req, &resp, decoders);
        if self.config.strict {
            if let Some(v) = fresh.first() {
                return Err(SimError::ContractViolation(*v));
            }
        }

        self.master.clock(&axi_out);
        self.bridge.clock(&axi_in, &resp);
        self.responder.clock(&req);

        self.last_request = req;
        self.last_response = resp;
        self.cycle += 1;
        Ok(())
    }

    pub fn run(&mut self, cycles: u64) -> Result<(), SimError> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    /// Step until `done` holds, at most `timeout_cycles` times. Returns the
    /// number of cycles taken.
    pub fn run_until<F>(&mut self, waiting_for: &str, mut done: F) -> Result<u64, SimError>
    where
        F: FnMut(&Self) -> bool,
    {
        let start = self.cycle;
        while !done(self) {
            if self.cycle - start >= self.config.timeout_cycles {
                log::warn!("timeout after {} cycles: {}", self.config.timeout_cycles, waiting_for);
                return Err(SimError::Timeout {
                    cycles: self.config.timeout_cycles,
                    waiting_for: waiting_for.to_string(),
                });
            }
            self.step()?;
        }
        Ok(self.cycle - start)
    }

    /// Full AXI write; returns the B response.
    pub fn write(&mut self, addr: u32, data: u32) -> Result<Resp, SimError> {
        self.master.write(addr, data);
        self.finish_write(addr)
    }

    pub fn write_skewed(&mut self, addr: u32, data: u32, aw_delay: u32, w_delay: u32) -> Result<Resp, SimError> {
        self.master.write_skewed(addr, data, aw_delay, w_delay);
        self.finish_write(addr)
    }

    fn finish_write(&mut self, addr: u32) -> Result<Resp, SimError> {
        let what = format!("write response for {:#010X}", addr);
        self.run_until(&what, |tb| tb.master.pending_writes() == 0)?;
        self.master
            .completed()
            .iter()
            .rev()
            .find_map(|c| match *c {
                AxiCompletion::Write { addr: a, resp } if a == addr => Some(resp),
                _ => None,
            })
            .ok_or(SimError::Timeout {
                cycles: 0,
                waiting_for: what,
            })
    }

    /// Full AXI read; returns data and R response.
    pub fn read(&mut self, addr: u32) -> Result<(u32, Resp), SimError> {
        self.master.read(addr);
        let what = format!("read data for {:#010X}", addr);
        self.run_until(&what, |tb| tb.master.pending_reads() == 0)?;
        self.master
            .completed()
            .iter()
            .rev()
            .find_map(|c| match *c {
                AxiCompletion::Read { addr: a, data, resp } if a == addr => Some((data, resp)),
                _ => None,
            })
            .ok_or(SimError::Timeout {
                cycles: 0,
                waiting_for: what,
            })
    }

    /// Pulse the responder's reset for one cycle.
    pub fn reset_responder(&mut self) -> Result<(), SimError> {
        self.responder.reset();
        self.step()
    }
}

impl<R: Responder + Clone> Testbench<R> {
    /// Snapshot of the device side. The master must be idle: queued AXI
    /// jobs are not part of a save state.
    pub fn save_state(&self) -> Result<SaveState<R>, SimError> {
        if !self.master.is_done() {
            return Err(SimError::SaveState(
                "master has transactions in flight".to_string(),
            ));
        }
        Ok(SaveState::new(
            self.cycle,
            self.bridge.clone(),
            self.responder.clone(),
            self.monitor.clone(),
        ))
    }

    pub fn from_state(state: SaveState<R>, config: TestbenchConfig) -> Self {
        Self {
            config,
            cycle: state.cycle,
            master: AxiLiteMaster::new(),
            bridge: state.bridge,
            responder: state.responder,
            monitor: state.monitor,
            last_request: BusRequest::default(),
            last_response: BusResponse::IDLE,
        }
    }
}

/// RegPort master driving responders directly, no bridge.
#[derive(Debug, Clone)]
pub struct PortBench<R> {
    timeout_cycles: u64,
    cycle: u64,
    master: RegPortMaster,
    responder: R,
    monitor: ContractMonitor,
    last_response: BusResponse,
}

impl<R: Responder> PortBench<R> {
    pub fn new(master: RegPortMaster, responder: R) -> Self {
        Self {
            timeout_cycles: debug_flags::timeout_cycles(),
            cycle: 0,
            master,
            responder,
            monitor: ContractMonitor::new(),
            last_response: BusResponse::IDLE,
        }
    }

    pub fn with_timeout(mut self, cycles: u64) -> Self {
        self.timeout_cycles = cycles;
        self
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn master(&self) -> &RegPortMaster {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut RegPortMaster {
        &mut self.master
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    pub fn responder_mut(&mut self) -> &mut R {
        &mut self.responder
    }

    pub fn monitor(&self) -> &ContractMonitor {
        &self.monitor
    }

    /// Request the master drives in the coming cycle.
    pub fn peek_request(&self) -> BusRequest {
        self.master.request()
    }

    /// Response the responder shows for the coming cycle's request.
    pub fn peek_response(&self) -> BusResponse {
        self.responder.respond(&self.master.request())
    }

    pub fn last_response(&self) -> BusResponse {
        self.last_response
    }

    pub fn step(&mut self) {
        let req = self.master.request();
        let resp = self.responder.respond(&req);
        let decoders = self.responder.decoder_count(req.address);

        trace_cycle(self.cycle, &req, &resp);
        self.monitor.observe(&req, &resp, decoders);

        self.master.clock(&resp);
        self.responder.clock(&req);
        self.last_response = resp;
        self.cycle += 1;
    }

    pub fn run_until<F>(&mut self, waiting_for: &str, mut done: F) -> Result<u64, SimError>
    where
        F: FnMut(&Self) -> bool,
    {
        let start = self.cycle;
        while !done(self) {
            if self.cycle - start >= self.timeout_cycles {
                return Err(SimError::Timeout {
                    cycles: self.timeout_cycles,
                    waiting_for: waiting_for.to_string(),
                });
            }
            self.step();
        }
        Ok(self.cycle - start)
    }

    /// Run every queued access to completion.
    pub fn drain(&mut self) -> Result<Vec<Completion>, SimError> {
        self.run_until("master queue to drain", |b| b.master.is_done())?;
        Ok(self.master.take_completed())
    }
}
